//! Entity module - `SeaORM` entity definitions for the three store tables.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod expense;
pub mod income;
pub mod user_settings;

// Re-export specific types to avoid conflicts
pub use expense::{Entity as Expense, Model as ExpenseModel};
pub use income::{Entity as Income, Model as IncomeModel};
pub use user_settings::{Entity as UserSettings, Model as UserSettingsModel};
