use tether_dom::Node;

use crate::scope::{Context, Scope, Teardown};

/// Listen for `event` on `node` and call the behavior's `handler` with the
/// scope's context. The listener is removed when the scope is torn down.
///
/// The handler is looked up on every firing, so a missing handler is not an
/// error: the event is simply ignored.
pub(crate) fn bind_event(scope: &Scope, node: &Node, event: &str, handler: &str) {
    let weak = scope.downgrade();
    let name = handler.to_string();
    let id = node.add_event_listener(event, move |ev| {
        let Some(scope) = weak.upgrade() else {
            return;
        };
        if scope.is_destroyed() {
            return;
        }
        match scope.behavior().handler(&name) {
            Some(handler) => handler(ev, &Context::new(scope.clone())),
            None => tracing::debug!(handler = %name, event = ev.event_type(), "missing handler, ignoring event"),
        }
    });
    scope.hold(Teardown::Listener(node.clone(), id));
}
