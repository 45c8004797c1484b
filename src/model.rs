pub mod item;
pub mod item_manager;
pub mod known_items;
pub mod navigation;
pub mod section;

pub use item::{Item, ItemIdentity, Namespace, ParseItemIdentityError};
pub use item_manager::ItemManager;
pub use known_items::KnownItems;
pub use navigation::{NavigationState, SettingsPane};
pub use section::Section;
