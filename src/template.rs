//! Compiled templates.
//!
//! A transform document is compiled once by [`compiler`] into a tree of
//! [`TNode`]s plus a [`TemplateRepository`] of named templates. Both are
//! immutable afterwards and hold no per-invocation state.
//!
//! # Directives
//!
//! ```text
//! {
//!   "#template(Person, who)": { "Name": "#($who.First + ' ' + $who.Last)" },
//!   "#variable(region)": "#(Region)",
//!   "#foreach(Customers[Active], Customers)": {
//!     "#calltemplate(Person)": { "who": "#(@)" },
//!     "#if(Balance > 1000)": { "Tier": "gold" },
//!     "#else": { "Tier": "standard" },
//!     "Region": "#($region)"
//!   }
//! }
//! ```

pub(crate) mod compiler;
pub(crate) mod document;
pub mod nodes;
pub mod repository;

pub use nodes::{ForEachTarget, PropertyName, Selection, TNode};
pub use repository::{Template, TemplateRepository};
