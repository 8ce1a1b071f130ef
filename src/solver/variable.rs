/// Opaque index into a [`super::SolverBackend`]'s variable arena.
///
/// `VarId` is never constructed by client code outside of this crate during
/// normal use; backends hand out [`Variable`] handles from `create_variable`
/// and everything downstream treats them as opaque. The `new`/`index`
/// accessors are `pub(crate)`-adjacent in spirit but left `pub` so that a
/// test or an external `SolverBackend` implementation can round-trip a
/// handle through serialization if it needs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(u32);

impl VarId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// The kind of decision variable, fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum VarKind {
    Continuous,
    Integer,
    Binary,
}

/// A decision variable owned by a solver session.
///
/// Identity is by opaque handle; the variable's kind, bounds, and tag live
/// in the owning [`super::SolverBackend`], not on the handle itself, so that
/// handles stay cheap to copy and compare. A `Variable`'s lifetime is the
/// enclosing solver session: it must never be used against a different
/// session (the driver asserts this, see `crate::driver`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable {
    id: VarId,
}

impl Variable {
    pub fn from_id(id: VarId) -> Self {
        Self { id }
    }

    pub fn id(self) -> VarId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_with_same_id_are_equal() {
        assert_eq!(Variable::from_id(VarId::new(3)), Variable::from_id(VarId::new(3)));
        assert_ne!(Variable::from_id(VarId::new(3)), Variable::from_id(VarId::new(4)));
    }
}
