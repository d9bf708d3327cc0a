use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::html::{escape_html, VOID_ELEMENTS};

type Listener = Rc<dyn Fn(&Event)>;

/// Handle returned by [`Node::add_event_listener`], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What a node is: an element with a tag and attributes, a text run, or a comment.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

struct NodeData {
    kind: NodeKind,
    parent: Weak<RefCell<NodeData>>,
    children: Vec<Node>,
    listeners: Vec<(ListenerId, String, Listener)>,
    next_listener: u64,
}

/// A shared handle to a node in a mutable tree.
///
/// Cloning a `Node` clones the handle, not the node. Use [`Node::deep_clone`]
/// to copy a subtree. Parents hold their children strongly; children point
/// back to their parent weakly.
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

/// An event travelling from its target up through the target's ancestors.
pub struct Event {
    event_type: String,
    target: Node,
    stopped: Cell<bool>,
}

impl Event {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> &Node {
        &self.target
    }

    /// Keep the event from reaching ancestors of the node currently handling it.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type)
            .field("target", &self.target)
            .finish()
    }
}

impl Node {
    fn with_kind(kind: NodeKind) -> Self {
        Node(Rc::new(RefCell::new(NodeData {
            kind,
            parent: Weak::new(),
            children: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
        })))
    }

    pub fn element(tag: &str) -> Self {
        Self::with_kind(NodeKind::Element {
            tag: tag.to_lowercase(),
            attrs: Vec::new(),
        })
    }

    pub fn text(data: &str) -> Self {
        Self::with_kind(NodeKind::Text(data.to_string()))
    }

    pub fn comment(data: &str) -> Self {
        Self::with_kind(NodeKind::Comment(data.to_string()))
    }

    /// A snapshot of this node's kind (tag + attributes, or character data).
    pub fn kind(&self) -> NodeKind {
        self.0.borrow().kind.clone()
    }

    pub fn tag(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Text(_))
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Comment(_))
    }

    /// True when both handles point at the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ── Tree structure ──────────────────────────────────────────────────

    pub fn parent(&self) -> Option<Node> {
        self.0.borrow().parent.upgrade().map(Node)
    }

    /// All child nodes, including text and comments.
    pub fn child_nodes(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    /// Element children only, like `.children` in a browser.
    pub fn children(&self) -> Vec<Node> {
        self.0
            .borrow()
            .children
            .iter()
            .filter(|c| c.is_element())
            .cloned()
            .collect()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.borrow().children.first().cloned()
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = parent.position_of(self)?;
        let data = parent.0.borrow();
        data.children.get(index + 1).cloned()
    }

    fn position_of(&self, child: &Node) -> Option<usize> {
        self.0.borrow().children.iter().position(|c| c.ptr_eq(child))
    }

    /// Append `child` as the last child, moving it out of its current parent first.
    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference`, or at the end when `reference` is `None`.
    ///
    /// A reference that is not a child of this node is treated as `None`.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        child.remove();
        let index = match reference {
            Some(r) => match self.position_of(r) {
                Some(i) => i,
                None => {
                    tracing::debug!("insert_before: reference is not a child, appending");
                    self.0.borrow().children.len()
                }
            },
            None => self.0.borrow().children.len(),
        };
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.insert(index, child.clone());
    }

    /// Remove `child` from this node. Returns false if it was not a child.
    pub fn remove_child(&self, child: &Node) -> bool {
        let Some(index) = self.position_of(child) else {
            return false;
        };
        self.0.borrow_mut().children.remove(index);
        child.0.borrow_mut().parent = Weak::new();
        true
    }

    /// Detach this node from its parent, if it has one.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    /// Put `replacement` where this node is and detach this node.
    pub fn replace_with(&self, replacement: &Node) {
        if let Some(parent) = self.parent() {
            parent.insert_before(replacement, Some(self));
            parent.remove_child(self);
        }
    }

    // ── Character data ──────────────────────────────────────────────────

    /// Concatenated text of this node and its descendants. Comments contribute nothing
    /// when nested in an element.
    pub fn text_content(&self) -> String {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(t) | NodeKind::Comment(t) => t.clone(),
            NodeKind::Element { .. } => {
                let mut out = String::new();
                for child in &data.children {
                    if !child.is_comment() {
                        out.push_str(&child.text_content());
                    }
                }
                out
            }
        }
    }

    /// Replace the character data of a text/comment node, or all children of
    /// an element with a single text node.
    pub fn set_text_content(&self, text: &str) {
        let old_children = {
            let mut guard = self.0.borrow_mut();
            let data = &mut *guard;
            match &mut data.kind {
                NodeKind::Text(t) | NodeKind::Comment(t) => {
                    *t = text.to_string();
                    return;
                }
                NodeKind::Element { .. } => std::mem::take(&mut data.children),
            }
        };
        for child in old_children {
            child.0.borrow_mut().parent = Weak::new();
        }
        if !text.is_empty() {
            self.append_child(&Node::text(text));
        }
    }

    // ── Attributes and classes ──────────────────────────────────────────

    pub fn attribute(&self, name: &str) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn attributes(&self) -> Vec<(String, String)> {
        match &self.0.borrow().kind {
            NodeKind::Element { attrs, .. } => attrs.clone(),
            _ => Vec::new(),
        }
    }

    /// Set an attribute, keeping its original position if it already exists.
    /// Has no effect on text and comment nodes.
    pub fn set_attribute(&self, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.0.borrow_mut().kind {
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        if let NodeKind::Element { attrs, .. } = &mut self.0.borrow_mut().kind {
            let index = attrs.iter().position(|(k, _)| k == name)?;
            return Some(attrs.remove(index).1);
        }
        None
    }

    pub fn class_list(&self) -> Vec<String> {
        self.attribute("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_list().iter().any(|c| c == class)
    }

    /// Add or remove `class` so that its presence matches `on`.
    pub fn toggle_class(&self, class: &str, on: bool) {
        let mut classes = self.class_list();
        let present = classes.iter().any(|c| c == class);
        if on == present {
            return;
        }
        if on {
            classes.push(class.to_string());
        } else {
            classes.retain(|c| c != class);
        }
        if classes.is_empty() {
            self.remove_attribute("class");
        } else {
            self.set_attribute("class", &classes.join(" "));
        }
    }

    // ── Events ──────────────────────────────────────────────────────────

    pub fn add_event_listener(&self, event_type: &str, listener: impl Fn(&Event) + 'static) -> ListenerId {
        let mut data = self.0.borrow_mut();
        data.next_listener += 1;
        let id = ListenerId(data.next_listener);
        data.listeners.push((id, event_type.to_string(), Rc::new(listener)));
        id
    }

    /// Remove a listener. Removing an unknown id is a no-op that returns false.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut data = self.0.borrow_mut();
        let before = data.listeners.len();
        data.listeners.retain(|(lid, _, _)| *lid != id);
        data.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.0.borrow().listeners.len()
    }

    /// Dispatch an event on this node, bubbling to the root.
    ///
    /// Listeners are snapshotted per node before any of them run, so a
    /// listener may freely mutate the tree.
    pub fn dispatch_event(&self, event_type: &str) {
        let event = Event {
            event_type: event_type.to_string(),
            target: self.clone(),
            stopped: Cell::new(false),
        };
        let mut current = Some(self.clone());
        while let Some(node) = current {
            let listeners: Vec<Listener> = node
                .0
                .borrow()
                .listeners
                .iter()
                .filter(|(_, t, _)| t == event_type)
                .map(|(_, _, l)| Rc::clone(l))
                .collect();
            for listener in listeners {
                listener(&event);
            }
            if event.stopped.get() {
                break;
            }
            current = node.parent();
        }
    }

    pub fn click(&self) {
        self.dispatch_event("click");
    }

    // ── Copy and serialize ──────────────────────────────────────────────

    /// Copy this node and its subtree. Listeners are not copied and the copy has no parent.
    pub fn deep_clone(&self) -> Node {
        let copy = Node::with_kind(self.kind());
        for child in self.child_nodes() {
            copy.append_child(&child.deep_clone());
        }
        copy
    }

    /// Serialize this node and its subtree as HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(t) => out.push_str(&escape_html(t)),
            NodeKind::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_html(value));
                        out.push('"');
                    }
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &data.children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.borrow().kind {
            NodeKind::Element { tag, .. } => write!(f, "Node(<{tag}>)"),
            NodeKind::Text(t) => write!(f, "Node({t:?})"),
            NodeKind::Comment(c) => write!(f, "Node(<!--{c}-->)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn list(items: &[&str]) -> Node {
        let ul = Node::element("ul");
        for item in items {
            let li = Node::element("li");
            li.set_text_content(item);
            ul.append_child(&li);
        }
        ul
    }

    fn texts(node: &Node) -> Vec<String> {
        node.children().iter().map(Node::text_content).collect()
    }

    #[test]
    fn test_insert_before_and_remove() {
        let ul = list(&["a", "c"]);
        let b = Node::element("li");
        b.set_text_content("b");
        let c = ul.children()[1].clone();
        ul.insert_before(&b, Some(&c));
        assert_eq!(texts(&ul), vec!["a", "b", "c"]);
        assert!(b.parent().unwrap().ptr_eq(&ul));

        b.remove();
        assert_eq!(texts(&ul), vec!["a", "c"]);
        assert!(b.parent().is_none());
    }

    #[test]
    fn test_append_moves_between_parents() {
        let first = list(&["a"]);
        let second = list(&[]);
        let a = first.children()[0].clone();
        second.append_child(&a);
        assert!(first.children().is_empty());
        assert_eq!(texts(&second), vec!["a"]);
    }

    #[test]
    fn test_children_skip_text_and_comments() {
        let ul = list(&["a"]);
        ul.append_child(&Node::comment("anchor"));
        ul.append_child(&Node::text("  "));
        assert_eq!(ul.children().len(), 1);
        assert_eq!(ul.child_nodes().len(), 3);
        assert_eq!(ul.text_content(), "a  ");
    }

    #[test]
    fn test_toggle_class() {
        let div = Node::element("div");
        div.set_attribute("class", "item");
        div.toggle_class("visible", true);
        assert_eq!(div.attribute("class").as_deref(), Some("item visible"));
        div.toggle_class("visible", true);
        assert_eq!(div.attribute("class").as_deref(), Some("item visible"));
        div.toggle_class("item", false);
        div.toggle_class("visible", false);
        assert!(!div.has_attribute("class"));
    }

    #[test]
    fn test_dispatch_bubbles_and_listeners_can_be_removed() {
        let ul = list(&["a"]);
        let li = ul.children()[0].clone();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = Rc::clone(&seen);
        let id = li.add_event_listener("click", move |e| {
            s.borrow_mut().push(format!("li:{}", e.event_type()));
        });
        let s = Rc::clone(&seen);
        ul.add_event_listener("click", move |e| {
            assert!(e.target().tag().as_deref() == Some("li"));
            s.borrow_mut().push("ul".to_string());
        });

        li.click();
        assert_eq!(*seen.borrow(), vec!["li:click", "ul"]);

        assert!(li.remove_event_listener(id));
        assert!(!li.remove_event_listener(id));
        li.click();
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn test_deep_clone_drops_listeners_and_parent() {
        let ul = list(&["a"]);
        let li = ul.children()[0].clone();
        li.add_event_listener("click", |_| {});
        let copy = li.deep_clone();
        assert!(copy.parent().is_none());
        assert_eq!(copy.listener_count(), 0);
        assert_eq!(copy.to_html(), "<li>a</li>");
    }

    #[test]
    fn test_to_html_escapes() {
        let p = Node::element("p");
        p.set_attribute("title", "a \"b\"");
        p.set_text_content("<x>");
        assert_eq!(p.to_html(), r#"<p title="a &quot;b&quot;">&lt;x&gt;</p>"#);
    }
}
