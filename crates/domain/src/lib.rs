pub mod entities;
pub mod repositories;
pub mod target_query_builder;
pub mod value_objects;

pub use entities::*;
pub use fleet_errors::{FleetError, FleetResult};
pub use repositories::*;
pub use target_query_builder::{TargetQueryBuilder, TargetQueryParam};
pub use value_objects::*;
