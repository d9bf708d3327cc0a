mod behavior;
mod binding;
mod each;
mod error;
mod events;
mod expr;
mod list;
mod model;
mod path;
mod scan;
mod scope;
mod view;

pub use behavior::{builtin_filter, Behavior, Filter, Getter, Handler, BUILTIN_FILTERS};
pub use error::{BindError, Result};
pub use expr::{is_truthy, render_value, Expression, Template};
pub use list::ObservedList;
pub use model::{Model, Splice, Subscription};
pub use path::Path;
pub use scan::{scan, DirectiveSite, SiteKind};
pub use scope::{Context, Scope};
pub use view::{attach, View};

pub use tether_dom::{parse_fragment, parse_html, Event, Node};
pub use tether_parser::{Directive, Segment};

/// Parse `html` and bind its first element to `model`.
///
/// Returns `Ok(None)` when the markup holds no element.
pub fn attach_html(
    html: &str,
    model: impl Into<Model>,
    behavior: impl Into<std::rc::Rc<Behavior>>,
) -> Result<Option<View>> {
    match parse_html(html) {
        Some(root) => attach(&root, model, behavior).map(Some),
        None => Ok(None),
    }
}
