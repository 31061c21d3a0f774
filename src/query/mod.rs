pub mod compiler;
pub mod condition;
pub mod page;
pub mod sorter;
pub mod spec;

pub use compiler::{
    CompiledPredicate, OrderTerm, PredicateClause, ProjectedColumn, QueryCompiler, SelectStatement,
    StandardCompiler,
};
pub use condition::{ConditionEntry, ConditionSet, ConditionType};
pub use page::Page;
pub use sorter::SortSpec;
pub use spec::QuerySpec;
