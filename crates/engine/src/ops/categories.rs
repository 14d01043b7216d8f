use uuid::Uuid;

use crate::{
    Category, EngineError, EntityKey, EntityStore, ResultEngine, util::normalize_required_name,
};

use super::Document;

impl<S: EntityStore> Document<S> {
    /// Add a category. Names are unique, case-insensitively.
    pub fn new_category(&mut self, name: &str) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "category")?;
        self.ensure_unique_category_name(&name, None)?;
        self.insert(Category::new(name))
    }

    pub fn rename_category(&mut self, category_id: Uuid, name: &str) -> ResultEngine<()> {
        let name = normalize_required_name(name, "category")?;
        self.ensure_unique_category_name(&name, Some(category_id))?;
        let mut category = self.require_category(category_id)?.clone();
        category.name = name;
        self.update(category)
    }

    /// Delete a category. Categories still in use are rejected at commit.
    pub fn delete_category(&mut self, category_id: Uuid) -> ResultEngine<()> {
        self.require_category(category_id)?;
        self.delete(EntityKey::category(category_id))?;
        Ok(())
    }

    /// Find a category by name, case-insensitively.
    pub fn category_by_name(&self, name: &str) -> Option<&Category> {
        let name = name.trim().to_lowercase();
        self.categories()
            .into_iter()
            .find(|category| category.name.to_lowercase() == name)
    }

    fn ensure_unique_category_name(&self, name: &str, except: Option<Uuid>) -> ResultEngine<()> {
        if self
            .category_by_name(name)
            .is_some_and(|category| Some(category.id) != except)
        {
            return Err(EngineError::ExistingKey(name.to_string()));
        }
        Ok(())
    }
}
