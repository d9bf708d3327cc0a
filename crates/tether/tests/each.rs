use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};
use tether::{attach, Behavior, Model, Node, View};

fn mount(html: &str, model: impl Into<Model>, behavior: Behavior) -> (Node, View) {
    let el = tether::parse_html(html).unwrap();
    let view = attach(&el, model, behavior).unwrap();
    (el, view)
}

fn texts(el: &Node) -> Vec<String> {
    el.children().iter().map(Node::text_content).collect()
}

const TODOS: &str = r#"<ul><li each="todos">{this}</li></ul>"#;

#[test]
fn test_empty_list_renders_nothing() {
    let (el, _view) = mount(TODOS, Model::default(), Behavior::new());
    assert_eq!(el.children().len(), 0);
}

#[test]
fn test_predefined_list_renders_in_order() {
    let (el, _view) = mount(TODOS, json!({"todos": ["milk", "cereal", "apples"]}), Behavior::new());
    assert_eq!(texts(&el), vec!["milk", "cereal", "apples"]);
}

#[test]
fn test_setting_the_list_replaces_items() {
    let (el, view) = mount(TODOS, json!({"todos": ["candy"]}), Behavior::new());
    assert_eq!(texts(&el), vec!["candy"]);

    view.set("todos", json!(["milk", "cereal", "apples"])).unwrap();
    assert_eq!(texts(&el), vec!["milk", "cereal", "apples"]);
}

#[test]
fn test_set_after_destroy_has_no_effect() {
    let host = tether::parse_html(r#"<main><ul><li each="todos">{this}</li></ul></main>"#).unwrap();
    let el = host.children()[0].clone();
    let view = attach(&el, json!({"todos": ["candy"]}), Behavior::new()).unwrap();
    assert_eq!(texts(&el), vec!["candy"]);

    view.destroy();
    assert!(el.parent().is_none());

    view.set("todos", json!(["milk", "cereal"])).unwrap();
    assert_eq!(el.children().len(), 1);

    // Writing straight to the model reaches no binding either
    view.model().set("todos", json!(["x", "y", "z"])).unwrap();
    assert_eq!(el.children().len(), 1);
    assert_eq!(view.model().subscriber_count(), 0);
}

#[test]
fn test_destroy_twice_is_harmless() {
    let (_el, view) = mount(TODOS, json!({"todos": ["a"]}), Behavior::new());
    view.destroy();
    view.destroy();
    assert!(view.is_destroyed());
}

#[test]
fn test_items_resolve_against_their_own_model() {
    let (el, _view) = mount(
        r#"<ul><li each="todos">{name}</li></ul>"#,
        json!({"todos": [{"name": "milk"}, {"name": "cereal"}, {"name": "apples"}]}),
        Behavior::new(),
    );
    assert_eq!(texts(&el), vec!["milk", "cereal", "apples"]);
}

#[test]
fn test_items_use_view_filters() {
    let behavior = Behavior::new().with_filter("uppercase", |v| match v {
        Value::String(s) => json!(s.to_uppercase()),
        _ => Value::Null,
    });
    let (el, _view) = mount(
        r#"<ul><li each="todos"><span data-text="name | uppercase"></span></li></ul>"#,
        json!({"todos": [{"name": "milk"}, {"name": "cereal"}, {"name": "apples"}]}),
        behavior,
    );
    assert_eq!(texts(&el), vec!["MILK", "CEREAL", "APPLES"]);
}

#[test]
fn test_handlers_run_in_the_item_context() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let behavior = Behavior::new().with_handler("clicked", move |_, ctx| {
        sink.borrow_mut().push((ctx.model().get("name").unwrap(), ctx.index()));
    });
    let (el, _view) = mount(
        r##"<ul><li each="todos"><a href="#" on-click="clicked">click</a></li></ul>"##,
        json!({"todos": [{"name": "milk"}, {"name": "cereal"}, {"name": "apples"}]}),
        behavior,
    );

    el.first_child().unwrap().first_child().unwrap().click();
    assert_eq!(*seen.borrow(), vec![(Some(json!("milk")), Some(0))]);
}

#[test]
fn test_push_appends() {
    let (el, view) = mount(TODOS, json!({"todos": []}), Behavior::new());
    assert_eq!(el.children().len(), 0);

    let todos = view.list("todos").unwrap();
    todos.push("milk").unwrap();
    assert_eq!(el.children()[0].text_content(), "milk");

    todos.push("cereal").unwrap();
    assert_eq!(el.children()[1].text_content(), "cereal");
}

#[test]
fn test_unshift_prepends() {
    let (el, view) = mount(TODOS, json!({"todos": []}), Behavior::new());
    let todos = view.list("todos").unwrap();

    todos.unshift("milk").unwrap();
    assert_eq!(el.children()[0].text_content(), "milk");

    todos.unshift("cereal").unwrap();
    assert_eq!(el.children()[0].text_content(), "cereal");

    todos.push("apples").unwrap();
    assert_eq!(el.children()[2].text_content(), "apples");
}

#[test]
fn test_splice_inserts_and_replaces() {
    let (el, view) = mount(TODOS, json!({"todos": []}), Behavior::new());
    let todos = view.list("todos").unwrap();

    todos.splice(0, 0, [json!("milk"), json!("eggs")]).unwrap();
    assert_eq!(texts(&el), vec!["milk", "eggs"]);
    assert_eq!(view.get("todos").unwrap(), Some(json!(["milk", "eggs"])));

    todos.splice(0, 1, [json!("apples")]).unwrap();
    assert_eq!(texts(&el), vec!["apples", "eggs"]);
    assert_eq!(view.get("todos").unwrap(), Some(json!(["apples", "eggs"])));

    todos.splice(0, 0, [json!("milk")]).unwrap();
    assert_eq!(texts(&el), vec!["milk", "apples", "eggs"]);
    assert_eq!(view.get("todos").unwrap(), Some(json!(["milk", "apples", "eggs"])));
}

#[test]
fn test_sibling_lists_keep_block_order() {
    let (el, view) = mount(
        r#"<ul><li each="todos">{this}</li><li each="tonots">{this}</li></ul>"#,
        json!({"todos": [], "tonots": []}),
        Behavior::new(),
    );
    assert_eq!(el.children().len(), 0);

    view.list("tonots").unwrap().push("milk").unwrap();
    assert_eq!(texts(&el), vec!["milk"]);

    view.list("todos").unwrap().push("apples").unwrap();
    assert_eq!(texts(&el), vec!["apples", "milk"]);

    view.list("tonots").unwrap().push("cereal").unwrap();
    assert_eq!(texts(&el), vec!["apples", "milk", "cereal"]);
}

#[test]
fn test_index_follows_position() {
    let (el, view) = mount(
        r#"<ul><li each="todos">{$index}:{this}</li></ul>"#,
        json!({"todos": ["a", "b"]}),
        Behavior::new(),
    );
    view.list("todos").unwrap().unshift("z").unwrap();
    assert_eq!(texts(&el), vec!["0:z", "1:a", "2:b"]);

    view.list("todos").unwrap().remove_range(0..2).unwrap();
    assert_eq!(texts(&el), vec!["0:b"]);
}

#[test]
fn test_items_can_reach_the_parent_scope() {
    let (el, view) = mount(
        r#"<ul><li each="todos">{$parent.owner}/{this}</li></ul>"#,
        json!({"owner": "ann", "todos": ["a"]}),
        Behavior::new(),
    );
    assert_eq!(texts(&el), vec!["ann/a"]);
    view.set("owner", "bob").unwrap();
    assert_eq!(texts(&el), vec!["bob/a"]);
}

#[test]
fn test_handler_can_remove_its_own_item() {
    let behavior = Behavior::new().with_handler("remove", |_, ctx| {
        let (Some(parent), Some(index)) = (ctx.parent(), ctx.index()) else {
            return;
        };
        parent.model().list("todos").unwrap().remove_range(index..index + 1).unwrap();
    });
    let (el, _view) = mount(
        r#"<ul><li each="todos" on-click="remove">{this}</li></ul>"#,
        json!({"todos": ["a", "b", "c"]}),
        behavior,
    );

    el.children()[1].click();
    assert_eq!(texts(&el), vec!["a", "c"]);

    // Indices were updated, so removing the last item now hits "c"
    el.children()[1].click();
    assert_eq!(texts(&el), vec!["a"]);
}

#[test]
fn test_mutation_from_a_subscriber_is_applied_in_order() {
    let model = Model::from(json!({"todos": ["a"]}));
    let (el, _view) = mount(TODOS, model.clone(), Behavior::new());

    let m = model.clone();
    let _echo = model
        .observe("todos", move |splice| {
            // Mirror every single insert once more, from inside the notification
            if splice.inserted == vec![json!("b")] {
                m.list("todos").unwrap().push("c").unwrap();
            }
        })
        .unwrap();

    model.list("todos").unwrap().push("b").unwrap();
    assert_eq!(texts(&el), vec!["a", "b", "c"]);
    assert_eq!(model.get("todos").unwrap(), Some(json!(["a", "b", "c"])));
}

#[test]
fn test_item_writes_update_bindings_and_parent_data() {
    let behavior = Behavior::new().with_handler("done", |_, ctx| {
        ctx.set("done", true).unwrap();
    });
    let (el, view) = mount(
        r#"<ul><li each="todos" data-visible="done" on-click="done">{name}</li></ul>"#,
        json!({"todos": [{"name": "milk", "done": false}]}),
        behavior,
    );
    let li = el.children()[0].clone();
    assert!(!li.has_class("visible"));

    li.click();
    assert!(li.has_class("visible"));
    assert_eq!(view.get("todos.0.done").unwrap(), Some(json!(true)));
}

#[test]
fn test_non_list_source_is_empty() {
    let (el, view) = mount(TODOS, json!({"todos": 42}), Behavior::new());
    assert_eq!(el.children().len(), 0);
    view.set("todos", json!(["x"])).unwrap();
    assert_eq!(texts(&el), vec!["x"]);
}

#[test]
fn test_nested_lists() {
    let (el, view) = mount(
        r#"<div><section each="groups"><h2>{title}</h2><p each="items">{this}</p></section></div>"#,
        json!({"groups": [{"title": "g1", "items": ["a", "b"]}]}),
        Behavior::new(),
    );
    let section = el.children()[0].clone();
    assert_eq!(texts(&section), vec!["g1", "a", "b"]);

    view.list("groups").unwrap().push(json!({"title": "g2", "items": []})).unwrap();
    assert_eq!(el.children().len(), 2);
    assert_eq!(texts(&el.children()[1]), vec!["g2"]);
}

#[test]
fn test_root_each_is_an_error() {
    let el = tether::parse_html(r#"<li each="todos"></li>"#).unwrap();
    let err = attach(&el, Model::default(), Behavior::new()).unwrap_err();
    assert_eq!(err, tether::BindError::OrphanTemplate { tag: "li".into() });
}

#[test]
fn test_attach_html_parses_and_binds() {
    let view = tether::attach_html(TODOS, json!({"todos": ["q"]}), Behavior::new())
        .unwrap()
        .unwrap();
    assert_eq!(texts(view.root()), vec!["q"]);
    assert!(tether::attach_html("just text", Model::default(), Behavior::new()).unwrap().is_none());
}

#[test]
fn test_writes_to_list_elements_update_items() {
    let (el, view) = mount(TODOS, json!({"todos": ["a", "b"]}), Behavior::new());
    view.set("todos.0", "z").unwrap();
    assert_eq!(texts(&el), vec!["z", "b"]);

    view.set("todos.2", "c").unwrap();
    assert_eq!(texts(&el), vec!["z", "b", "c"]);

    view.list("todos").unwrap().push("d").unwrap();
    assert_eq!(texts(&el), vec!["z", "b", "c", "d"]);
    assert_eq!(view.get("todos").unwrap(), Some(json!(["z", "b", "c", "d"])));
}

#[test]
fn test_writes_to_item_fields_update_items() {
    let (el, view) = mount(
        r#"<ul><li each="todos" data-visible="done">{name}</li></ul>"#,
        json!({"todos": [{"name": "milk", "done": false}]}),
        Behavior::new(),
    );
    view.set("todos.0.name", "eggs").unwrap();
    view.set("todos.0.done", true).unwrap();
    let li = el.children()[0].clone();
    assert_eq!(li.text_content(), "eggs");
    assert!(li.has_class("visible"));
}

#[test]
fn test_unreachable_writes_leave_the_list_alone() {
    let (el, view) = mount(
        r#"<ul><li each="todos">{name}</li></ul>"#,
        json!({"todos": [{"name": "a"}, {"name": "b"}]}),
        Behavior::new(),
    );
    assert!(matches!(view.set("todos.5.name", "x"), Err(tether::BindError::Unwritable { .. })));
    assert!(matches!(
        view.set("todos.18446744073709551615", 1),
        Err(tether::BindError::Unwritable { .. })
    ));
    assert_eq!(view.get("todos").unwrap(), Some(json!([{"name": "a"}, {"name": "b"}])));
    assert_eq!(texts(&el), vec!["a", "b"]);

    view.list("todos").unwrap().push(json!({"name": "c"})).unwrap();
    assert_eq!(texts(&el), vec!["a", "b", "c"]);
}

#[test]
fn test_nested_lists_follow_view_edits() {
    let (el, view) = mount(
        r#"<div><section each="groups"><p each="items">{this}</p></section></div>"#,
        json!({"groups": [{"items": ["a"]}, {"items": []}]}),
        Behavior::new(),
    );
    view.list("groups.0.items").unwrap().push("b").unwrap();
    view.list("groups.1.items").unwrap().unshift("x").unwrap();
    assert_eq!(texts(&el.children()[0]), vec!["a", "b"]);
    assert_eq!(texts(&el.children()[1]), vec!["x"]);

    view.set("groups.0.items", json!(["c"])).unwrap();
    assert_eq!(texts(&el.children()[0]), vec!["c"]);

    view.list("groups.0.items").unwrap().splice(0, 0, [json!("p"), json!("q")]).unwrap();
    assert_eq!(texts(&el.children()[0]), vec!["p", "q", "c"]);
    assert_eq!(view.get("groups.0.items").unwrap(), Some(json!(["p", "q", "c"])));
}

#[test]
fn test_each_on_the_bound_root_is_an_error_even_with_a_parent() {
    let ul = tether::parse_html(r#"<ul><li each="todos">{this}</li></ul>"#).unwrap();
    let li = ul.children()[0].clone();
    let err = attach(&li, json!({"todos": ["a"]}), Behavior::new()).unwrap_err();
    assert_eq!(err, tether::BindError::OrphanTemplate { tag: "li".into() });
    // Nothing was bound or swapped out
    assert!(li.parent().is_some_and(|p| p.ptr_eq(&ul)));
    assert_eq!(ul.child_nodes().len(), 1);
    assert_eq!(li.attribute("each").as_deref(), Some("todos"));
}
