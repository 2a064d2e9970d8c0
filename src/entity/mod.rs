pub mod broadcast_events;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod terminal_displays;
pub mod terminals;

pub use broadcast_events::Entity as BroadcastEvents;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use terminal_displays::Entity as TerminalDisplays;
pub use terminals::Entity as Terminals;
