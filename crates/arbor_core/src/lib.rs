pub mod codec;
pub mod entity;
pub mod error;
pub mod event;
pub mod filter;
pub mod ids;
pub mod schema;
pub mod time;
pub mod value;

pub use codec::*;
pub use entity::*;
pub use error::{ArborError, ArborResult};
pub use event::EntityEvent;
pub use filter::*;
pub use ids::*;
pub use schema::*;
pub use time::*;
pub use value::*;
