mod descriptor;
mod request;
mod schema;

pub use descriptor::{DatabaseDescriptor, DbType};
pub use request::{
    split_qualified, FilterOperator, JoinRequest, JoinType, LogicalOperator, OrderDirection,
    QueryRequest, Search,
};
pub use schema::{ColumnHandle, DataClass, SchemaMap};
