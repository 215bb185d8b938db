use quartz_nbt::{NbtCompound, NbtTag};

/// A block-entity record: a position, an id, and whatever extra fields the
/// entity carries (chest contents, sign text, ...). The extra fields are kept
/// verbatim so unknown entity kinds survive a round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEntity {
    pub id: String,
    pub position: (i32, i32, i32),
    pub nbt: NbtCompound,
}

impl BlockEntity {
    pub fn new(id: impl Into<String>, position: (i32, i32, i32)) -> Self {
        BlockEntity {
            id: id.into(),
            position,
            nbt: NbtCompound::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<NbtTag>) -> Self {
        self.nbt.insert(key, value);
        self
    }

    /// Parse from a sidecar compound. `id`, `x`, `y` and `z` are lifted out;
    /// everything else stays in `nbt`.
    pub fn from_nbt(compound: &NbtCompound) -> Self {
        let id = compound
            .get::<_, &str>("id")
            .map(|s| s.to_string())
            .unwrap_or_default();
        let x = compound.get::<_, i32>("x").unwrap_or(0);
        let y = compound.get::<_, i32>("y").unwrap_or(0);
        let z = compound.get::<_, i32>("z").unwrap_or(0);

        let mut nbt = NbtCompound::new();
        for (key, value) in compound.inner() {
            match key.as_str() {
                "id" | "x" | "y" | "z" => continue,
                _ => nbt.insert(key.clone(), value.clone()),
            }
        }
        BlockEntity {
            id,
            position: (x, y, z),
            nbt,
        }
    }

    pub fn to_nbt(&self) -> NbtCompound {
        let mut compound = NbtCompound::new();
        for (key, value) in self.nbt.inner() {
            compound.insert(key.clone(), value.clone());
        }
        compound.insert("id", NbtTag::String(self.id.clone()));
        compound.insert("x", NbtTag::Int(self.position.0));
        compound.insert("y", NbtTag::Int(self.position.1));
        compound.insert("z", NbtTag::Int(self.position.2));
        compound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_preserves_extra_fields() {
        let entity = BlockEntity::new("Chest", (10, -60, 3))
            .with_field("CustomName", NbtTag::String("loot".to_string()))
            .with_field("Findable", NbtTag::Byte(1));

        let compound = entity.to_nbt();
        let back = BlockEntity::from_nbt(&compound);
        assert_eq!(back, entity);
        assert_eq!(
            back.nbt.get::<_, &str>("CustomName").unwrap(),
            "loot"
        );
    }

    #[test]
    fn test_missing_fields_default() {
        let entity = BlockEntity::from_nbt(&NbtCompound::new());
        assert_eq!(entity.id, "");
        assert_eq!(entity.position, (0, 0, 0));
    }
}
