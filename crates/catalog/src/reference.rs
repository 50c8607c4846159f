//! Reference data replicated to every product shard.
//!
//! Categories and suppliers are created once with caller-supplied ids and
//! never updated or removed; each product shard holds a full copy so that
//! product reads can join locally.

use serde::{Deserialize, Serialize};

use shardcat_core::{CategoryId, DomainError, DomainResult, Entity, SupplierId};

/// Product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

impl Category {
    pub fn new(id: CategoryId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        Ok(Self { id, name })
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Product supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    /// Free-text contact info (email, phone, address...).
    pub contact_info: String,
}

impl Supplier {
    pub fn new(
        id: SupplierId,
        name: impl Into<String>,
        contact_info: impl Into<String>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            contact_info: contact_info.into(),
        })
    }
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_rejects_blank_name() {
        let err = Category::new(CategoryId::new(1).unwrap(), "  ").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn supplier_keeps_contact_info_verbatim() {
        let s = Supplier::new(SupplierId::new(3).unwrap(), "ClothDist", "clothdist@example.com")
            .unwrap();
        assert_eq!(s.contact_info, "clothdist@example.com");
        assert_eq!(s.id().get(), 3);
    }
}
