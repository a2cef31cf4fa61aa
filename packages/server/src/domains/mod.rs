// Domain modules
//
// Each domain owns its models, activities (business logic), and workflow
// definitions.

pub mod analysis;
