//! Capability offers.
//!
//! An [Offer] is a tagged union over the capability kinds a node can route to
//! its children. Every known kind shares the same routing fields, exposed through
//! [OfferDecl], so callers transform offers with a single [Offer::visit] or
//! [Offer::visit_mut] instead of matching on each kind.

use crate::component::ChildRef;
use alloc::boxed::Box;

/// Where a capability is routed from or to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref {
    Parent,
    Self_,
    Child(ChildRef),
    Collection(Box<str>),
    Framework,
}

/// Routing fields common to every offer kind.
pub trait OfferDecl {
    fn source(&self) -> Option<&Ref>;
    fn set_source(&mut self, source: Ref);
    fn source_name(&self) -> Option<&str>;
    fn target(&self) -> Option<&Ref>;
    fn target_name(&self) -> Option<&str>;
}

macro_rules! offer_decl {
    ($(#[$meta: meta])* $name: ident { $($(#[$fmeta: meta])* $field: ident : $ty: ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name {
            pub source: Option<Ref>,
            pub source_name: Option<Box<str>>,
            pub target: Option<Ref>,
            pub target_name: Option<Box<str>>,
            $($(#[$fmeta])* pub $field: $ty,)*
        }

        impl OfferDecl for $name {
            fn source(&self) -> Option<&Ref> {
                self.source.as_ref()
            }

            fn set_source(&mut self, source: Ref) {
                self.source = Some(source);
            }

            fn source_name(&self) -> Option<&str> {
                self.source_name.as_deref()
            }

            fn target(&self) -> Option<&Ref> {
                self.target.as_ref()
            }

            fn target_name(&self) -> Option<&str> {
                self.target_name.as_deref()
            }
        }
    };
}

offer_decl!(OfferService {});
offer_decl!(OfferProtocol {});
offer_decl!(OfferDirectory {
    /// Subdirectory of the source directory to offer.
    subdir: Option<Box<str>>,
});
offer_decl!(OfferStorage {});
offer_decl!(OfferRunner {});
offer_decl!(OfferResolver {});
offer_decl!(OfferEvent {
    /// Opaque filter forwarded untouched.
    filter: Option<Box<str>>,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offer {
    Service(OfferService),
    Protocol(OfferProtocol),
    Directory(OfferDirectory),
    Storage(OfferStorage),
    Runner(OfferRunner),
    Resolver(OfferResolver),
    Event(OfferEvent),
    /// A kind this side of the protocol does not understand.
    Unknown,
}

impl Offer {
    /// Apply `apply` to the routing fields. Return [None] for [Offer::Unknown].
    pub fn visit<R>(&self, apply: impl FnOnce(&dyn OfferDecl) -> R) -> Option<R> {
        match self {
            Offer::Service(decl) => Some(apply(decl)),
            Offer::Protocol(decl) => Some(apply(decl)),
            Offer::Directory(decl) => Some(apply(decl)),
            Offer::Storage(decl) => Some(apply(decl)),
            Offer::Runner(decl) => Some(apply(decl)),
            Offer::Resolver(decl) => Some(apply(decl)),
            Offer::Event(decl) => Some(apply(decl)),
            Offer::Unknown => None,
        }
    }

    /// Mutable counterpart of [Offer::visit].
    pub fn visit_mut<R>(&mut self, apply: impl FnOnce(&mut dyn OfferDecl) -> R) -> Option<R> {
        match self {
            Offer::Service(decl) => Some(apply(decl)),
            Offer::Protocol(decl) => Some(apply(decl)),
            Offer::Directory(decl) => Some(apply(decl)),
            Offer::Storage(decl) => Some(apply(decl)),
            Offer::Runner(decl) => Some(apply(decl)),
            Offer::Resolver(decl) => Some(apply(decl)),
            Offer::Event(decl) => Some(apply(decl)),
            Offer::Unknown => None,
        }
    }

    /// Name used when describing the offer: the target name, else the source name.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Offer::Service(decl) => decl.target_name().or(decl.source_name()),
            Offer::Protocol(decl) => decl.target_name().or(decl.source_name()),
            Offer::Directory(decl) => decl.target_name().or(decl.source_name()),
            Offer::Storage(decl) => decl.target_name().or(decl.source_name()),
            Offer::Runner(decl) => decl.target_name().or(decl.source_name()),
            Offer::Resolver(decl) => decl.target_name().or(decl.source_name()),
            Offer::Event(decl) => decl.target_name().or(decl.source_name()),
            Offer::Unknown => None,
        }
    }
}
