use alloc::boxed::Box;
use decl::{ChildRef, CollectionRef};

/// Component collection a node's driver was launched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collection {
    /// Not launched by the runner (yet).
    #[default]
    None,
    /// Driver hosts.
    Host,
    /// Drivers resolved from the boot image.
    Boot,
    /// Drivers resolved from packages.
    Package,
}

impl Collection {
    /// Collection name in the realm, empty for [Collection::None].
    pub const fn name(self) -> &'static str {
        match self {
            Collection::None => "",
            Collection::Host => "driver-hosts",
            Collection::Boot => "boot-drivers",
            Collection::Package => "pkg-drivers",
        }
    }

    /// Boot-scheme URLs go to [Collection::Boot], everything else to [Collection::Package].
    pub fn for_url(url: &str, boot_scheme: &str) -> Collection {
        if url.starts_with(boot_scheme) {
            Collection::Boot
        } else {
            Collection::Package
        }
    }

    pub fn collection_ref(self) -> CollectionRef {
        CollectionRef {
            name: self.name().into(),
        }
    }

    pub fn child_ref(self, name: &str) -> ChildRef {
        let collection = self.name();
        ChildRef {
            name: name.into(),
            collection: (!collection.is_empty()).then(|| Box::from(collection)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_scheme_picks_collection() {
        let boot = "fuchsia-boot://";
        assert_eq!(Collection::for_url("fuchsia-boot:///#meta/root.cm", boot), Collection::Boot);
        assert_eq!(Collection::for_url("fuchsia-pkg://fuchsia.com/usb#meta/usb.cm", boot), Collection::Package);
        assert_eq!(Collection::Package.name(), "pkg-drivers");
    }

    #[test]
    fn uncollected_child_ref_has_no_collection() {
        assert_eq!(Collection::None.child_ref("root").collection, None);
        assert_eq!(Collection::Host.child_ref("driver-host-0").collection.as_deref(), Some("driver-hosts"));
    }
}
