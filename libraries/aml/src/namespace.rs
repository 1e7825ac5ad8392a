use core::fmt;

use alloc::{
    collections::{BTreeMap, BTreeSet},
    vec::Vec,
};
use tracing::trace;

use crate::{
    error::AmlParseError,
    name::{NamePrefix, NameSeg, NameString},
    node::Slot,
    opcode::OpCode,
};

/// Absolute path of `name` when used inside `scope`, without applying the
/// search rules. `None` if it goes above the root.
pub(crate) fn absolute_path(name: &NameString, scope: &[NameSeg]) -> Option<Vec<NameSeg>> {
    let base = match name.prefix() {
        NamePrefix::Root => &[][..],
        NamePrefix::Parent(n) => scope.get(..scope.len().checked_sub(n)?)?,
        NamePrefix::None => scope,
    };

    let mut path = Vec::with_capacity(base.len() + name.segments().len());
    path.extend_from_slice(base);
    path.extend_from_slice(name.segments());
    Some(path)
}

pub(crate) struct PathDisplay<'a>(pub &'a [NameSeg]);

impl fmt::Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\\")?;
        for (i, seg) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(".")?;
            }
            fmt::Display::fmt(seg, f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NamespaceObject {
    pub opcode: OpCode,
    /// Set only for methods
    pub arg_count: Option<u8>,
    /// Declared with `External`, a later real declaration replaces it
    pub external: bool,
    pub declared_at: usize,
}

impl NamespaceObject {
    pub fn new(opcode: OpCode, declared_at: usize) -> Self {
        Self {
            opcode,
            arg_count: None,
            external: false,
            declared_at,
        }
    }

    fn predefined(opcode: OpCode) -> Self {
        Self::new(opcode, usize::MAX)
    }
}

/// All objects declared so far, by absolute path
pub(crate) struct Namespace {
    objects: BTreeMap<Vec<NameSeg>, NamespaceObject>,
}

impl Namespace {
    /// Namespace with the objects the OS always provides
    pub fn with_predefined() -> Self {
        let mut namespace = Self {
            objects: BTreeMap::new(),
        };

        namespace
            .objects
            .insert(Vec::new(), NamespaceObject::predefined(OpCode::SCOPE));

        let predefined = [
            (b"_GPE", OpCode::SCOPE, None),
            (b"_PR_", OpCode::SCOPE, None),
            (b"_SB_", OpCode::SCOPE, None),
            (b"_SI_", OpCode::SCOPE, None),
            (b"_TZ_", OpCode::SCOPE, None),
            (b"_GL_", OpCode::MUTEX, None),
            (b"_OS_", OpCode::NAME, None),
            (b"_OSI", OpCode::METHOD, Some(1)),
            (b"_REV", OpCode::NAME, None),
        ];

        for (name, opcode, arg_count) in predefined {
            let Some(seg) = NameSeg::new(*name) else {
                continue;
            };
            namespace.objects.insert(
                alloc::vec![seg],
                NamespaceObject {
                    arg_count,
                    ..NamespaceObject::predefined(opcode)
                },
            );
        }

        namespace
    }

    /// Returns `false` if the path was already declared and was kept as is
    pub fn declare(&mut self, path: Vec<NameSeg>, object: NamespaceObject) -> bool {
        match self.objects.get_mut(&path) {
            Some(existing) if existing.external && !object.external => {
                trace!(
                    "{} replaces the External declared at {:#x}",
                    object.opcode, existing.declared_at
                );
                *existing = object;
                true
            }
            Some(_) => false,
            None => {
                self.objects.insert(path, object);
                true
            }
        }
    }

    pub fn get(&self, path: &[NameSeg]) -> Option<&NamespaceObject> {
        self.objects.get(path)
    }

    /// Find `name` as referenced from `scope`.
    ///
    /// A bare single segment is searched in `scope` then each parent up to
    /// the root, any other form must match exactly.
    pub fn lookup(&self, name: &NameString, scope: &[NameSeg]) -> Option<&NamespaceObject> {
        if name.is_single_segment() {
            let seg = name.last_segment()?;
            let mut path = Vec::with_capacity(scope.len() + 1);
            for depth in (0..=scope.len()).rev() {
                path.clear();
                path.extend_from_slice(&scope[..depth]);
                path.push(seg);
                if let Some(object) = self.objects.get(&path) {
                    return Some(object);
                }
            }
            return None;
        }

        self.get(&absolute_path(name, scope)?)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }
}

/// A term list that stopped at a name that wasn't declared at that point.
///
/// The list is parsed again from `offset` once the name is declared, the
/// nodes from `index` onwards are replaced by the new parse.
#[derive(Debug, Clone)]
pub(crate) struct PendingReference {
    pub name: NameString,
    pub name_offset: usize,
    /// Namespace scope of the term list
    pub scope: Vec<NameSeg>,
    /// Where the object owning the term list is in the tree, empty for the root
    pub path: Vec<Slot>,
    pub index: usize,
    /// Start of the term that referenced the name
    pub offset: usize,
    /// End of the term list
    pub end: usize,
    pub depth: u32,
    /// First error met while looking ahead in the rest of the list
    pub walk_error: Option<AmlParseError>,
}

/// Pending references indexed by the last segment of the name they wait for
#[derive(Default)]
pub(crate) struct PendingReferences {
    next_id: usize,
    entries: BTreeMap<usize, PendingReference>,
    by_name: BTreeMap<NameSeg, Vec<usize>>,
    ready: BTreeSet<usize>,
}

impl PendingReferences {
    pub fn insert(&mut self, pending: PendingReference) -> usize {
        let id = self.next_id;
        self.next_id += 1;

        if let Some(seg) = pending.name.last_segment() {
            self.by_name.entry(seg).or_default().push(id);
        }
        self.entries.insert(id, pending);
        id
    }

    pub fn set_walk_error(&mut self, id: usize, err: AmlParseError) {
        if let Some(pending) = self.entries.get_mut(&id) {
            pending.walk_error.get_or_insert(err);
        }
    }

    /// Mark as ready all references waiting for a name ending in `seg` that
    /// now resolve.
    pub fn wake(&mut self, seg: NameSeg, namespace: &Namespace) {
        let Some(ids) = self.by_name.get(&seg) else {
            return;
        };

        for id in ids {
            if let Some(pending) = self.entries.get(id) {
                if namespace.lookup(&pending.name, &pending.scope).is_some() {
                    self.ready.insert(*id);
                }
            }
        }
    }

    pub fn wake_all(&mut self) {
        self.ready.extend(self.entries.keys().copied());
    }

    pub fn take_ready(&mut self) -> Option<PendingReference> {
        let id = self.ready.pop_first()?;
        let pending = self.entries.remove(&id)?;

        if let Some(seg) = pending.name.last_segment() {
            if let Some(ids) = self.by_name.get_mut(&seg) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.by_name.remove(&seg);
                }
            }
        }

        Some(pending)
    }

    /// The earliest reference still waiting
    pub fn first(&self) -> Option<&PendingReference> {
        self.entries.values().min_by_key(|pending| pending.name_offset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;
    use crate::testing;

    fn seg(name: &str) -> NameSeg {
        crate::name::canonicalize(name).unwrap()
    }

    fn path(names: &[&str]) -> Vec<NameSeg> {
        names.iter().map(|n| seg(n)).collect()
    }

    fn waiting(name: &str, scope: &[&str]) -> PendingReference {
        PendingReference {
            name: NameString::from_asl(name).unwrap(),
            name_offset: 0,
            scope: path(scope),
            path: Vec::new(),
            index: 0,
            offset: 0,
            end: 0,
            depth: 0,
            walk_error: None,
        }
    }

    testing::test! {
        fn test_absolute_path() {
            let scope = path(&["_SB", "PCI0"]);
            let name = NameString::from_asl("^LPC.EC").unwrap();
            assert_eq!(absolute_path(&name, &scope), Some(path(&["_SB", "LPC", "EC"])));

            let name = NameString::from_asl("\\_TZ.TZ0").unwrap();
            assert_eq!(absolute_path(&name, &scope), Some(path(&["_TZ", "TZ0"])));

            let name = NameString::from_asl("^^^FOO").unwrap();
            assert_eq!(absolute_path(&name, &scope), None);
        }

        fn test_search_rules() {
            let mut namespace = Namespace::with_predefined();
            namespace.declare(
                path(&["_SB", "FOO"]),
                NamespaceObject::new(OpCode::NAME, 0),
            );

            let scope = path(&["_SB", "PCI0", "LPC"]);
            let foo = NameString::from_asl("FOO").unwrap();
            assert!(namespace.lookup(&foo, &scope).is_some());
            assert!(namespace.lookup(&foo, &[]).is_none());

            // no upward search for multi segment names
            let qualified = NameString::from_asl("PCI0.FOO").unwrap();
            assert!(namespace.lookup(&qualified, &path(&["_SB"])).is_none());

            let osi = NameString::from_asl("_OSI").unwrap();
            assert_eq!(namespace.lookup(&osi, &scope).unwrap().arg_count, Some(1));
        }

        fn test_external_replaced() {
            let mut namespace = Namespace::with_predefined();
            let external = NamespaceObject {
                arg_count: Some(2),
                external: true,
                ..NamespaceObject::new(OpCode::EXTERNAL, 0)
            };
            assert!(namespace.declare(path(&["MTH"]), external));

            let method = NamespaceObject {
                arg_count: Some(3),
                ..NamespaceObject::new(OpCode::METHOD, 10)
            };
            assert!(namespace.declare(path(&["MTH"]), method));
            assert!(!namespace.declare(path(&["MTH"]), external));
            assert_eq!(namespace.get(&path(&["MTH"])).unwrap().arg_count, Some(3));
        }

        fn test_pending_wake() {
            let mut namespace = Namespace::with_predefined();
            let mut pending = PendingReferences::default();
            let first = pending.insert(waiting("FOO", &["_SB"]));
            let second = pending.insert(waiting("\\_TZ.FOO", &["_SB"]));
            assert_ne!(first, second);

            namespace.declare(path(&["_SB", "FOO"]), NamespaceObject::new(OpCode::NAME, 0));
            pending.wake(seg("FOO"), &namespace);

            let ready = pending.take_ready().unwrap();
            assert_eq!(ready.name.to_string(), "FOO_");
            assert!(pending.take_ready().is_none());
            assert_eq!(pending.len(), 1);

            pending.wake_all();
            assert!(pending.take_ready().is_some());
            assert!(pending.first().is_none());
        }

        fn test_pending_walk_error() {
            use crate::error::AmlParseErrorKind;

            let mut pending = PendingReferences::default();
            let id = pending.insert(waiting("FOO", &[]));
            pending.set_walk_error(id, AmlParseError::new(AmlParseErrorKind::Truncated, 3));
            // the first error is the one kept
            pending.set_walk_error(id, AmlParseError::new(AmlParseErrorKind::Truncated, 9));
            // removed entries are ignored
            pending.set_walk_error(id + 1, AmlParseError::new(AmlParseErrorKind::Truncated, 1));

            let first = pending.first().unwrap();
            assert_eq!(first.walk_error.as_ref().map(AmlParseError::offset), Some(3));
        }
    }
}
