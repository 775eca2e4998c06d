//! Move paths
//!
//! Every place move analysis tracks gets one entry in a per-function tree:
//! one root per local, struct fields below their parent, and the *content*
//! of a place-capable owner as a child of the owner itself. Content paths
//! are what make `*cell` behave like a local: they can be moved out of and
//! written back independently of the owner that holds them.
//!
//! Derefs of borrows and of owners without a place capability are not
//! tracked. Accessing through them only needs the borrow or owner itself to
//! be alive, and nothing can be moved out of them.

use crate::compiler_frontend::analysis::capabilities::CapabilityRegistry;
use crate::compiler_frontend::analysis::move_checker::effects::{
    statement_operands, statement_write, terminator_operand,
};
use crate::compiler_frontend::analysis::move_checker::state::PathSet;
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_nodes::{
    FieldId, HirBlock, HirFunction, HirPlace, HirStatementKind, LocalId, TypeId, TypeKind,
};
use rustc_hash::FxHashMap;

pub type MovePathIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathProjection {
    Local(LocalId),
    Field(FieldId),

    /// `*owner` for an owner type with a registered place capability.
    Content,
}

/// How an untracked deref reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indirection {
    Reference { mutable: bool },

    /// An owner type using only the generic deref capability.
    Owner,
}

#[derive(Debug, Clone)]
pub struct MovePath {
    pub place: HirPlace,
    pub ty: TypeId,
    pub parent: Option<MovePathIndex>,
    pub children: Vec<MovePathIndex>,
    pub projection: PathProjection,

    /// Set when the type has a place capability. Such paths always have a content child.
    pub capability_owner: bool,

    /// How `*place` is reached when it isn't tracked.
    pub indirection: Option<Indirection>,

    /// The program names this place, or something under it.
    pub mentioned: bool,
}

/// Where a HIR place lives from the point of view of move analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceAccess {
    Tracked(MovePathIndex),

    /// Behind a borrow or plain owner stored at `anchor`.
    Indirect {
        anchor: MovePathIndex,
        via: Indirection,
    },
}

impl PlaceAccess {
    pub fn anchor(self) -> MovePathIndex {
        match self {
            PlaceAccess::Tracked(path) => path,
            PlaceAccess::Indirect { anchor, .. } => anchor,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MovePathTable {
    paths: Vec<MovePath>,
    root_by_local: FxHashMap<LocalId, MovePathIndex>,
    child_by_projection: FxHashMap<(MovePathIndex, PathProjection), MovePathIndex>,
    subtrees: Vec<PathSet>,
}

impl MovePathTable {
    /// Builds the tree from every local and every place the given blocks mention.
    ///
    /// Returns the first place that could not be resolved, which only happens
    /// for modules that skipped validation.
    pub fn build(
        function: &HirFunction,
        blocks: &[&HirBlock],
        types: &TypeContext,
        registry: &CapabilityRegistry,
    ) -> Result<Self, HirPlace> {
        let mut builder = MovePathBuilder {
            table: MovePathTable::default(),
            types,
            registry,
        };

        for local in &function.locals {
            builder.add_root(local.id, local.ty);
        }

        for block in blocks {
            for statement in &block.statements {
                for place in statement_places(&statement.kind) {
                    if builder.insert_place(place).is_none() {
                        return Err(place.clone());
                    }
                }
            }

            let operand = terminator_operand(&block.terminator);
            if let Some(place) = operand.and_then(|operand| operand.place()) {
                if builder.insert_place(place).is_none() {
                    return Err(place.clone());
                }
            }
        }

        let mut table = builder.table;
        table.compute_subtrees();
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn path(&self, index: MovePathIndex) -> &MovePath {
        &self.paths[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = (MovePathIndex, &MovePath)> {
        self.paths.iter().enumerate()
    }

    pub fn root(&self, local: LocalId) -> Option<MovePathIndex> {
        self.root_by_local.get(&local).copied()
    }

    pub fn child(
        &self,
        parent: MovePathIndex,
        projection: PathProjection,
    ) -> Option<MovePathIndex> {
        self.child_by_projection
            .get(&(parent, projection))
            .copied()
    }

    pub fn content_child(&self, owner: MovePathIndex) -> Option<MovePathIndex> {
        self.child(owner, PathProjection::Content)
    }

    /// The path and everything below it.
    pub fn subtree(&self, index: MovePathIndex) -> &PathSet {
        &self.subtrees[index]
    }

    /// Proper ancestors, nearest first.
    pub fn ancestors(&self, index: MovePathIndex) -> Vec<MovePathIndex> {
        let mut ancestors = Vec::new();
        let mut current = self.paths[index].parent;

        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.paths[parent].parent;
        }

        ancestors
    }

    /// The outermost place-capable content this path is part of, itself included.
    pub fn content_root(&self, index: MovePathIndex) -> Option<MovePathIndex> {
        let mut outermost = None;
        let mut current = Some(index);

        while let Some(path) = current {
            if self.paths[path].projection == PathProjection::Content {
                outermost = Some(path);
            }
            current = self.paths[path].parent;
        }

        outermost
    }

    pub fn is_content(&self, index: MovePathIndex) -> bool {
        self.paths[index].projection == PathProjection::Content
    }

    pub fn content_path_count(&self) -> usize {
        self.paths
            .iter()
            .filter(|path| path.projection == PathProjection::Content)
            .count()
    }

    pub fn resolve(&self, place: &HirPlace) -> Option<PlaceAccess> {
        match place {
            HirPlace::Local(local) => self.root(*local).map(PlaceAccess::Tracked),

            HirPlace::Field { base, field } => match self.resolve(base)? {
                PlaceAccess::Tracked(parent) => self
                    .child(parent, PathProjection::Field(*field))
                    .map(PlaceAccess::Tracked),
                indirect => Some(indirect),
            },

            HirPlace::Deref(base) => match self.resolve(base)? {
                PlaceAccess::Tracked(parent) => {
                    let path = &self.paths[parent];
                    if path.capability_owner {
                        return self.content_child(parent).map(PlaceAccess::Tracked);
                    }

                    path.indirection.map(|via| PlaceAccess::Indirect {
                        anchor: parent,
                        via,
                    })
                }
                indirect => Some(indirect),
            },
        }
    }

    // Children always get larger indices than their parent, so walking
    // backwards sees every child before its parent.
    fn compute_subtrees(&mut self) {
        let path_count = self.paths.len();
        let mut subtrees = (0..path_count)
            .map(|index| PathSet::singleton(path_count, index))
            .collect::<Vec<_>>();

        for index in (0..path_count).rev() {
            if let Some(parent) = self.paths[index].parent {
                let child = subtrees[index].clone();
                subtrees[parent].union_with(&child);
            }
        }

        self.subtrees = subtrees;
    }
}

struct MovePathBuilder<'a> {
    table: MovePathTable,
    types: &'a TypeContext<'a>,
    registry: &'a CapabilityRegistry,
}

impl MovePathBuilder<'_> {
    fn add_root(&mut self, local: LocalId, ty: TypeId) {
        let index = self.push_path(
            HirPlace::Local(local),
            ty,
            None,
            PathProjection::Local(local),
        );
        self.table.root_by_local.insert(local, index);
    }

    fn insert_place(&mut self, place: &HirPlace) -> Option<PlaceAccess> {
        let access = match place {
            HirPlace::Local(local) => PlaceAccess::Tracked(self.table.root(*local)?),

            HirPlace::Field { base, field } => match self.insert_place(base)? {
                PlaceAccess::Tracked(parent) => {
                    let parent_type = self.table.paths[parent].ty;
                    let field_type = self.types.field(parent_type, *field)?.ty;
                    PlaceAccess::Tracked(self.ensure_child(
                        parent,
                        PathProjection::Field(*field),
                        place.clone(),
                        field_type,
                    ))
                }
                indirect => indirect,
            },

            HirPlace::Deref(base) => match self.insert_place(base)? {
                PlaceAccess::Tracked(parent) => {
                    let path = &self.table.paths[parent];
                    if path.capability_owner {
                        PlaceAccess::Tracked(self.table.content_child(parent)?)
                    } else {
                        PlaceAccess::Indirect {
                            anchor: parent,
                            via: path.indirection?,
                        }
                    }
                }
                indirect => indirect,
            },
        };

        if let PlaceAccess::Tracked(index) = access {
            self.table.paths[index].mentioned = true;
        }

        Some(access)
    }

    fn ensure_child(
        &mut self,
        parent: MovePathIndex,
        projection: PathProjection,
        place: HirPlace,
        ty: TypeId,
    ) -> MovePathIndex {
        if let Some(existing) = self.table.child(parent, projection) {
            return existing;
        }

        let index = self.push_path(place, ty, Some(parent), projection);
        self.table.paths[parent].children.push(index);
        self.table
            .child_by_projection
            .insert((parent, projection), index);
        index
    }

    fn push_path(
        &mut self,
        place: HirPlace,
        ty: TypeId,
        parent: Option<MovePathIndex>,
        projection: PathProjection,
    ) -> MovePathIndex {
        let capability = self.registry.lookup(ty).map(|capability| capability.target);
        let indirection = match self.types.kind(ty) {
            Some(TypeKind::Ref { mutable, .. }) => Some(Indirection::Reference {
                mutable: *mutable,
            }),
            Some(TypeKind::Owner { .. }) if capability.is_none() => Some(Indirection::Owner),
            _ => None,
        };

        let index = self.table.paths.len();
        self.table.paths.push(MovePath {
            place: place.clone(),
            ty,
            parent,
            children: Vec::new(),
            projection,
            capability_owner: capability.is_some(),
            indirection,
            mentioned: false,
        });

        // The content always exists so drops can see it, even if nothing names `*owner`.
        if let Some(target) = capability {
            self.ensure_child(index, PathProjection::Content, place.deref(), target);
        }

        index
    }
}

fn statement_places(kind: &HirStatementKind) -> Vec<&HirPlace> {
    let mut places = statement_operands(kind)
        .into_iter()
        .filter_map(|operand| operand.place())
        .collect::<Vec<_>>();

    if let Some(place) = statement_write(kind) {
        places.push(place);
    }

    places
}
