//! Node tree primitives used by the Tether binding engine.
//!
//! [`Node`] is a cheap, shared handle (`Rc`) to a node in a mutable tree of
//! elements, text and comments. [`parse_html`] builds such a tree from a
//! fragment of markup and [`Node::to_html`] serializes it back.

mod html;
mod node;

pub use html::{escape_html, parse_fragment, parse_html};
pub use node::{Event, ListenerId, Node, NodeKind};
