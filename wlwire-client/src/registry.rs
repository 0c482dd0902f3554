//! Registry of server-advertised globals
//!
//! The registry object is created once per connection. The server announces
//! each global it offers with a `global` event and withdraws it with
//! `global_remove`; clients bind the ones they need by name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use wlwire_protocol::{registry, Message, NewId, ObjectId, WireError};
use wlwire_utils::{Result, WlwireError};

use crate::connection::{Connection, EventHandler, MessageSender};

/// A global advertised by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    /// Server-assigned numeric name
    pub name: u32,
    pub interface: String,
    /// Highest version the server supports
    pub version: u32,
}

/// An object created by [`Registry::bind_object`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundObject {
    pub id: ObjectId,
    pub interface: String,
    /// Version negotiated at bind time
    pub version: u32,
}

impl BoundObject {
    /// Fail unless the bound version is at least `min`
    pub fn require_version(&self, min: u32) -> Result<()> {
        if self.version < min {
            return Err(WlwireError::VersionTooLow {
                interface: self.interface.clone(),
                required: min,
                actual: self.version,
            });
        }
        Ok(())
    }
}

type GlobalMap = Arc<Mutex<HashMap<u32, Global>>>;

/// Handle to the connection's registry object
///
/// Cheap to clone; all clones see the same globals.
#[derive(Debug, Clone)]
pub struct Registry {
    id: ObjectId,
    sender: MessageSender,
    globals: GlobalMap,
}

impl Registry {
    pub(crate) fn new(id: ObjectId, sender: MessageSender) -> Self {
        Self {
            id,
            sender,
            globals: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Handler that applies advertisement events to this registry
    pub(crate) fn event_handler(&self) -> RegistryHandler {
        RegistryHandler {
            globals: self.globals.clone(),
        }
    }

    /// Object id of the registry
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Bind global `name` as `interface` at `version`, returning the new id
    ///
    /// Validation happens locally; nothing is sent if it fails.
    pub fn bind(&self, name: u32, interface: &str, version: u32) -> Result<ObjectId> {
        self.validate_bind(name, interface, version)?;

        let id = self.sender.alloc_id();
        let request = Message::builder(self.id, registry::REQ_BIND)
            .uint(name)
            .new_id(&NewId {
                interface: interface.to_string(),
                version,
                id,
            })
            .build();
        self.sender.send_message(request)?;

        tracing::debug!(name, interface, version, id, "Bound global");
        Ok(id)
    }

    /// Like [`bind`](Self::bind), but keeps the negotiated interface and version
    pub fn bind_object(&self, name: u32, interface: &str, version: u32) -> Result<BoundObject> {
        let id = self.bind(name, interface, version)?;
        Ok(BoundObject {
            id,
            interface: interface.to_string(),
            version,
        })
    }

    fn validate_bind(&self, name: u32, interface: &str, version: u32) -> Result<()> {
        let globals = self.globals.lock();
        let global = globals.get(&name).ok_or(WlwireError::UnknownGlobal(name))?;

        if global.interface != interface {
            return Err(WlwireError::InterfaceMismatch {
                name,
                expected: interface.to_string(),
                actual: global.interface.clone(),
            });
        }
        if version > global.version {
            return Err(WlwireError::UnsupportedVersion {
                interface: interface.to_string(),
                requested: version,
                advertised: global.version,
            });
        }
        Ok(())
    }

    /// First global advertising `interface`
    pub fn find_global(&self, interface: &str) -> Option<Global> {
        self.globals
            .lock()
            .values()
            .find(|g| g.interface == interface)
            .cloned()
    }

    pub fn has_global(&self, interface: &str) -> bool {
        self.globals.lock().values().any(|g| g.interface == interface)
    }

    /// Advertised version of `interface`, if present
    pub fn global_version(&self, interface: &str) -> Option<u32> {
        self.find_global(interface).map(|g| g.version)
    }

    /// Snapshot of all globals, ordered by name
    pub fn globals(&self) -> Vec<Global> {
        let mut globals: Vec<_> = self.globals.lock().values().cloned().collect();
        globals.sort_by_key(|g| g.name);
        globals
    }

    pub fn len(&self) -> usize {
        self.globals.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.lock().is_empty()
    }

    /// Wait until every interface in `required` has been advertised
    ///
    /// Checks what is already known, then runs up to `max_attempts`
    /// roundtrips, re-checking after each.
    pub fn wait_for_globals(
        &self,
        conn: &mut Connection,
        required: &[&str],
        max_attempts: usize,
    ) -> Result<()> {
        let mut missing = self.missing(required);
        let mut attempt = 0;

        while !missing.is_empty() && attempt < max_attempts {
            attempt += 1;
            tracing::debug!(attempt, missing = ?missing, "Waiting for globals");
            conn.roundtrip()?;
            missing = self.missing(required);
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(WlwireError::MissingGlobals(missing))
        }
    }

    fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|iface| !self.has_global(iface))
            .map(|iface| iface.to_string())
            .collect()
    }
}

/// Applies `global`/`global_remove` events to the shared globals table
pub(crate) struct RegistryHandler {
    globals: GlobalMap,
}

impl EventHandler for RegistryHandler {
    fn handle(&mut self, mut msg: Message) -> std::result::Result<(), WireError> {
        let opcode = msg.opcode;
        let mut args = msg.reader();
        match opcode {
            registry::EVT_GLOBAL => {
                let global = Global {
                    name: args.uint()?,
                    interface: args.string()?,
                    version: args.uint()?,
                };
                tracing::trace!(
                    name = global.name,
                    interface = %global.interface,
                    version = global.version,
                    "Global announced"
                );
                self.globals.lock().insert(global.name, global);
            }
            registry::EVT_GLOBAL_REMOVE => {
                let name = args.uint()?;
                if self.globals.lock().remove(&name).is_none() {
                    tracing::debug!(name, "Removal of unknown global");
                }
            }
            opcode => {
                tracing::debug!(opcode, "Ignoring unknown registry event");
            }
        }
        Ok(())
    }
}
