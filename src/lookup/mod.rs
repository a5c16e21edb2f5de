//! Binding surface consumed by the try-construct engine.
//!
//! Types arrive here already resolved; the registry only answers the
//! questions the engine needs: subtype compatibility, checked/unchecked
//! classification, the closeable capability, and `close()` lookup.
//! Method resolution results are memoized in an identity-keyed cache owned
//! by the registry rather than cached on shared bindings.

use std::cell::RefCell;
use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Identity of a resolved reference type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

/// Identity of a field binding visible to the method under compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub u32);

/// Resolved shape of a zero-argument `close()` method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseMethod {
    /// Type that declares the method (receiver for the invoke).
    pub declaring: TypeId,
    pub returns_void: bool,
    /// Checked exceptions declared on the method.
    pub thrown: Vec<TypeId>,
    /// Invoked via `invokeinterface` rather than `invokevirtual`.
    pub on_interface: bool,
}

#[derive(Debug, Clone)]
struct TypeEntry {
    name: String,
    super_type: Option<TypeId>,
    interfaces: Vec<TypeId>,
    is_interface: bool,
    /// `close()` declared directly on this type, if any.
    declared_close: Option<CloseMethod>,
}

/// Fixed positions for the well-known `java.lang`/`java.io` types seeded
/// into every registry, in `SEED` order.
#[derive(Debug, Clone, Copy)]
pub struct WellKnown {
    pub object: TypeId,
    pub throwable: TypeId,
    pub exception: TypeId,
    pub runtime_exception: TypeId,
    pub error: TypeId,
    pub auto_closeable: TypeId,
    pub io_exception: TypeId,
    pub closeable: TypeId,
    /// The only primitive the engine distinguishes, for opcode selection.
    pub int_primitive: TypeId,
}

/// (name, super index into SEED, is_interface)
static SEED: Lazy<Vec<(&'static str, Option<usize>, bool)>> = Lazy::new(|| {
    vec![
        ("java.lang.Object", None, false),
        ("java.lang.Throwable", Some(0), false),
        ("java.lang.Exception", Some(1), false),
        ("java.lang.RuntimeException", Some(2), false),
        ("java.lang.Error", Some(1), false),
        ("java.lang.AutoCloseable", None, true),
        ("java.io.IOException", Some(2), false),
        ("java.io.Closeable", None, true),
        ("int", None, false),
    ]
});

#[derive(Debug, Clone)]
pub struct FieldBinding {
    pub name: String,
    pub type_id: TypeId,
    pub is_final: bool,
}

/// The type/binding tables for one compilation.
#[derive(Debug)]
pub struct TypeRegistry {
    types: Vec<TypeEntry>,
    by_name: HashMap<String, TypeId>,
    fields: Vec<FieldBinding>,
    well_known: WellKnown,
    /// Memoized `close()` lookups, keyed by receiver type identity.
    close_cache: RefCell<HashMap<TypeId, Option<CloseMethod>>>,
}

impl TypeRegistry {
    /// Registry pre-seeded with the well-known throwable and closeable types.
    pub fn with_defaults() -> Self {
        let mut registry = TypeRegistry {
            types: Vec::new(),
            by_name: HashMap::new(),
            fields: Vec::new(),
            close_cache: RefCell::new(HashMap::new()),
            // placeholder, fixed up below once the seed types exist
            well_known: WellKnown {
                object: TypeId(0),
                throwable: TypeId(0),
                exception: TypeId(0),
                runtime_exception: TypeId(0),
                error: TypeId(0),
                auto_closeable: TypeId(0),
                io_exception: TypeId(0),
                closeable: TypeId(0),
                int_primitive: TypeId(0),
            },
        };
        let mut ids = Vec::with_capacity(SEED.len());
        for (name, super_index, is_interface) in SEED.iter() {
            let super_type = super_index.map(|i| ids[i]);
            let id = registry.define(name, super_type, Vec::new(), *is_interface);
            ids.push(id);
        }
        registry.well_known = WellKnown {
            object: ids[0],
            throwable: ids[1],
            exception: ids[2],
            runtime_exception: ids[3],
            error: ids[4],
            auto_closeable: ids[5],
            io_exception: ids[6],
            closeable: ids[7],
            int_primitive: ids[8],
        };
        // AutoCloseable.close() throws Exception; Closeable.close() throws IOException
        registry.types[ids[5].0 as usize].declared_close = Some(CloseMethod {
            declaring: ids[5],
            returns_void: true,
            thrown: vec![ids[2]],
            on_interface: true,
        });
        registry.types[ids[7].0 as usize].interfaces = vec![ids[5]];
        registry.types[ids[7].0 as usize].declared_close = Some(CloseMethod {
            declaring: ids[7],
            returns_void: true,
            thrown: vec![ids[6]],
            on_interface: true,
        });
        registry
    }

    pub fn well_known(&self) -> WellKnown {
        self.well_known
    }

    /// Define a new reference type.
    pub fn define(
        &mut self,
        name: &str,
        super_type: Option<TypeId>,
        interfaces: Vec<TypeId>,
        is_interface: bool,
    ) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeEntry {
            name: name.to_string(),
            super_type,
            interfaces,
            is_interface,
            declared_close: None,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Define a class extending the given exception type.
    pub fn define_exception(&mut self, name: &str, super_type: TypeId) -> TypeId {
        self.define(name, Some(super_type), Vec::new(), false)
    }

    /// Define a concrete resource class implementing the closeable
    /// capability, whose `close()` declares the given checked exceptions.
    pub fn define_resource_class(&mut self, name: &str, close_thrown: Vec<TypeId>) -> TypeId {
        let auto_closeable = self.well_known.auto_closeable;
        let id = self.define(name, Some(self.well_known.object), vec![auto_closeable], false);
        self.types[id.0 as usize].declared_close = Some(CloseMethod {
            declaring: id,
            returns_void: true,
            thrown: close_thrown,
            on_interface: false,
        });
        id
    }

    /// Declare (or override) `close()` directly on an existing type.
    pub fn declare_close(&mut self, on: TypeId, thrown: Vec<TypeId>, returns_void: bool) {
        let on_interface = self.types[on.0 as usize].is_interface;
        self.types[on.0 as usize].declared_close = Some(CloseMethod {
            declaring: on,
            returns_void,
            thrown,
            on_interface,
        });
        self.close_cache.borrow_mut().clear();
    }

    pub fn add_field(&mut self, name: &str, type_id: TypeId, is_final: bool) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(FieldBinding { name: name.to_string(), type_id, is_final });
        id
    }

    pub fn field(&self, id: FieldId) -> &FieldBinding {
        &self.fields[id.0 as usize]
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.types[id.0 as usize].name
    }

    /// Binary name with `/` separators, for the emission backend.
    pub fn internal_name(&self, id: TypeId) -> String {
        self.types[id.0 as usize].name.replace('.', "/")
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        self.types[id.0 as usize].is_interface
    }

    /// Subtype query: is `sub` assignment-compatible with `sup`?
    pub fn is_compatible_with(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        let entry = &self.types[sub.0 as usize];
        if let Some(parent) = entry.super_type {
            if self.is_compatible_with(parent, sup) {
                return true;
            }
        }
        entry.interfaces.iter().any(|&i| self.is_compatible_with(i, sup))
    }

    /// Unchecked exceptions: subtypes of RuntimeException or Error.
    pub fn is_unchecked_exception(&self, id: TypeId) -> bool {
        self.is_compatible_with(id, self.well_known.runtime_exception)
            || self.is_compatible_with(id, self.well_known.error)
    }

    pub fn is_checked_exception(&self, id: TypeId) -> bool {
        self.is_compatible_with(id, self.well_known.throwable) && !self.is_unchecked_exception(id)
    }

    /// Broad checked types tolerated as "unused" handlers in legacy mode.
    pub fn is_broad_checked_catch(&self, id: TypeId) -> bool {
        id == self.well_known.exception || id == self.well_known.throwable
    }

    pub fn implements_auto_closeable(&self, id: TypeId) -> bool {
        self.is_compatible_with(id, self.well_known.auto_closeable)
    }

    /// Find a zero-argument `close()` visible on the type: the exact method
    /// on the type or a supertype first, otherwise an interface-method lookup
    /// across all superinterfaces (covers multiple-interface inheritance
    /// where no single exact method exists).
    pub fn find_close_method(&self, id: TypeId) -> Option<CloseMethod> {
        if let Some(cached) = self.close_cache.borrow().get(&id) {
            return cached.clone();
        }
        let found = self.find_close_exact(id).or_else(|| self.find_close_in_interfaces(id));
        self.close_cache.borrow_mut().insert(id, found.clone());
        found
    }

    fn find_close_exact(&self, id: TypeId) -> Option<CloseMethod> {
        let entry = &self.types[id.0 as usize];
        if let Some(close) = &entry.declared_close {
            return Some(close.clone());
        }
        entry.super_type.and_then(|parent| self.find_close_exact(parent))
    }

    fn find_close_in_interfaces(&self, id: TypeId) -> Option<CloseMethod> {
        let entry = &self.types[id.0 as usize];
        for &interface in &entry.interfaces {
            if let Some(found) = self.find_close_method(interface) {
                return Some(found);
            }
        }
        entry.super_type.and_then(|parent| self.find_close_in_interfaces(parent))
    }
}
