pub mod event;
pub mod ids;
pub mod item;

pub use event::ResponseEvent;
pub use ids::{CatalogId, IndexPosition};
pub use item::{Attributes, CatalogItem, NamedRef};
