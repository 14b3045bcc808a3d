//! Typed views of a few protocol domains.
//!
//! Every domain is a thin façade over [`Client::execute`] and
//! [`Client::event_listener`]: typed params go in, typed returns and events
//! come out. Façades are created once per client through
//! [`Client::domain`].

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use hashbrown::HashMap;

use crate::client::Client;

/// Implements `Method`, `MethodType` and `Command` for a params struct.
macro_rules! impl_command {
    ($params:ty => $returns:ty, $method:literal) => {
        impl $params {
            pub const IDENTIFIER: &'static str = $method;
        }

        impl ::cdp_types::Method for $params {
            fn identifier(&self) -> ::cdp_types::MethodId {
                Self::IDENTIFIER.into()
            }
        }

        impl ::cdp_types::MethodType for $params {
            fn method_id() -> ::cdp_types::MethodId {
                Self::IDENTIFIER.into()
            }
        }

        impl ::cdp_types::Command for $params {
            type Response = $returns;
        }
    };
}

/// Implements `MethodType` for an event record.
macro_rules! impl_event {
    ($event:ty, $method:literal) => {
        impl $event {
            pub const IDENTIFIER: &'static str = $method;
        }

        impl ::cdp_types::MethodType for $event {
            fn method_id() -> ::cdp_types::MethodId {
                Self::IDENTIFIER.into()
            }
        }
    };
}

pub mod debugger;
pub mod runtime;
pub mod target;

/// A protocol domain façade bound to a client.
pub trait Domain: Send + Sync + 'static {
    /// The domain name used in method identifiers, like `Runtime`.
    const NAME: &'static str;

    fn new(client: Client) -> Self;
}

/// Lazily created domain façades of one client, at most one per type.
#[derive(Default)]
pub struct DomainRegistry {
    domains: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl DomainRegistry {
    /// Return the cached `D`, creating it with `make` on first use.
    pub fn get_or_create<D: Domain>(&self, make: impl FnOnce() -> D) -> Arc<D> {
        let mut domains = self.domains.lock().unwrap_or_else(PoisonError::into_inner);
        let domain = domains
            .entry(TypeId::of::<D>())
            .or_insert_with(|| {
                tracing::trace!(target: "cdp_client::domains", domain = D::NAME, "Creating domain");
                Arc::new(make())
            });
        match Arc::clone(domain).downcast::<D>() {
            Ok(domain) => domain,
            Err(_) => unreachable!("domain registry is keyed by type"),
        }
    }

    /// Number of façades created so far.
    pub fn len(&self) -> usize {
        self.domains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for DomainRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainRegistry")
            .field("domains", &self.len())
            .finish()
    }
}
