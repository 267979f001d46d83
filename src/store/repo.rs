use crate::Result;
use crate::domain::todo::TodoItem;

pub trait TodoRepository {
    /// Inserts a task. Fails with [`crate::Error::DuplicateKey`] when the id
    /// is already known and `overwrite` is false.
    fn add(&mut self, item: TodoItem, overwrite: bool) -> Result<()>;
    fn get(&self, message_id: &str) -> Option<&TodoItem>;
    /// Replaces a known task. Fails with [`crate::Error::NotFound`]
    /// otherwise.
    fn update(&mut self, item: TodoItem) -> Result<()>;
    fn remove(&mut self, message_id: &str);
    fn contains(&self, message_id: &str) -> bool;
    fn len(&self) -> usize;

    /// All tasks, ascending by scheduled time then message id.
    fn all(&self) -> Vec<TodoItem>;

    /// Flushes the whole collection to its backing storage.
    fn save(&self) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn extend(&mut self, items: Vec<TodoItem>, overwrite: bool) -> Result<()> {
        for item in items {
            self.add(item, overwrite)?;
        }
        Ok(())
    }
}
