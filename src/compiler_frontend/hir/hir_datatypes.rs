// ============================================================
// HIR Type Queries
// ============================================================
//
// Types are declared on the module (`HirModule::types`) and referenced by
// TypeId everywhere else. The TypeContext answers the questions the move
// pipeline keeps asking: is this Copy, does it need drop, what does a place
// resolve to.
//
// ============================================================

use crate::compiler_frontend::hir::hir_nodes::{
    DerefKind, FieldId, HirField, HirFunction, HirPlace, HirType, LocalId, TypeId, TypeKind,
};
use rustc_hash::FxHashMap;

/// Read-only view over the declared types of one module.
#[derive(Debug, Clone)]
pub struct TypeContext<'a> {
    types: &'a [HirType],
    index_by_id: FxHashMap<TypeId, usize>,

    // Computed once up front so recursive queries never walk a cycle.
    needs_drop: FxHashMap<TypeId, bool>,
}

impl<'a> TypeContext<'a> {
    pub fn new(types: &'a [HirType]) -> Self {
        let index_by_id = types
            .iter()
            .enumerate()
            .map(|(index, ty)| (ty.id, index))
            .collect::<FxHashMap<_, _>>();

        let mut context = Self {
            types,
            index_by_id,
            needs_drop: FxHashMap::default(),
        };
        context.compute_needs_drop();
        context
    }

    pub fn get(&self, id: TypeId) -> Option<&'a HirType> {
        self.index_by_id.get(&id).map(|index| &self.types[*index])
    }

    pub fn kind(&self, id: TypeId) -> Option<&'a TypeKind> {
        self.get(id).map(|ty| &ty.kind)
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.index_by_id.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a HirType> {
        self.types.iter()
    }

    pub fn name(&self, id: TypeId) -> String {
        match self.get(id) {
            Some(ty) => ty.name.to_owned(),
            None => format!("{}", id),
        }
    }

    /// Int, Bool and shared references. Everything else moves.
    pub fn is_copy(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            Some(TypeKind::Int | TypeKind::Bool | TypeKind::Ref { mutable: false, .. })
        )
    }

    pub fn needs_drop(&self, id: TypeId) -> bool {
        self.needs_drop.get(&id).copied().unwrap_or(false)
    }

    pub fn fields(&self, id: TypeId) -> &'a [HirField] {
        match self.kind(id) {
            Some(TypeKind::Struct { fields }) => fields,
            _ => &[],
        }
    }

    pub fn field(&self, struct_type: TypeId, field: FieldId) -> Option<&'a HirField> {
        self.fields(struct_type)
            .iter()
            .find(|candidate| candidate.id == field)
    }

    pub fn field_name(&self, struct_type: TypeId, field: FieldId) -> String {
        match self.field(struct_type, field) {
            Some(field) => field.name.to_owned(),
            None => format!("{}", field),
        }
    }

    pub fn is_owner(&self, id: TypeId) -> bool {
        matches!(self.kind(id), Some(TypeKind::Owner { .. }))
    }

    /// What `*place` resolves to for a value of this type, if it can be dereferenced at all.
    pub fn deref_target(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id)? {
            TypeKind::Ref { target, .. } => Some(*target),
            TypeKind::Owner { target, deref } if *deref != DerefKind::None => Some(*target),
            _ => None,
        }
    }

    /// Resolves the type of a place given the function's local types.
    pub fn place_type(
        &self,
        local_types: &FxHashMap<LocalId, TypeId>,
        place: &HirPlace,
    ) -> Option<TypeId> {
        match place {
            HirPlace::Local(local) => local_types.get(local).copied(),
            HirPlace::Field { base, field } => {
                let base_type = self.place_type(local_types, base)?;
                self.field(base_type, *field).map(|field| field.ty)
            }
            HirPlace::Deref(base) => {
                let base_type = self.place_type(local_types, base)?;
                self.deref_target(base_type)
            }
        }
    }

    fn compute_needs_drop(&mut self) {
        for ty in self.types {
            let direct = matches!(ty.kind, TypeKind::Resource | TypeKind::Owner { .. });
            self.needs_drop.insert(ty.id, direct);
        }

        // Struct drop-ness flows up from fields until nothing changes.
        let mut changed = true;
        while changed {
            changed = false;

            for ty in self.types {
                let TypeKind::Struct { fields } = &ty.kind else {
                    continue;
                };

                if self.needs_drop[&ty.id] {
                    continue;
                }

                let any_field = fields
                    .iter()
                    .any(|field| self.needs_drop.get(&field.ty).copied().unwrap_or(false));

                if any_field {
                    self.needs_drop.insert(ty.id, true);
                    changed = true;
                }
            }
        }
    }
}

pub fn local_types(function: &HirFunction) -> FxHashMap<LocalId, TypeId> {
    function
        .locals
        .iter()
        .map(|local| (local.id, local.ty))
        .collect::<FxHashMap<_, _>>()
}
