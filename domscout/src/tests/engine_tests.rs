//! End-to-end request cycles against in-memory documents.

use super::{init_tracing, laid_out, visible};
use crate::dom::{Document, MouseEvent, Rect};
use crate::html::HtmlDocument;
use crate::record::ElementRecord;
use crate::sink::MessageLog;
use crate::visibility::VisibilityPolicy;
use crate::{Engine, EngineConfig, QueryError};

const SENTINEL: &str = "domscout-finished";

fn messages<D: Document>(engine: &Engine<D, MessageLog>) -> Vec<&str> {
    engine.sink().messages().iter().map(String::as_str).collect()
}

#[test]
fn set_text_by_id_assigns_value_and_only_terminates() {
    init_tracing();
    let doc = laid_out(
        r#"<html><body><input class="txt" id="u" name="user" value=""></body></html>"#,
        &[("input", visible())],
    );
    let mut engine = Engine::new(doc, MessageLog::new());

    let summary = engine.invoke("setTextById", &["u", "alice"]).unwrap();

    let u = engine.document().element_by_id("u").unwrap().unwrap();
    assert_eq!(engine.document().value(u).unwrap().as_deref(), Some("alice"));
    assert_eq!(messages(&engine), vec![SENTINEL]);
    assert_eq!(summary.reported, 0);
    assert_eq!(summary.target, Some(u));
}

#[test]
fn by_class_skips_the_row_above_the_viewport() {
    init_tracing();
    let mut doc = HtmlDocument::parse(
        r#"<html><body><div class="row" id="a">A</div><div class="row" id="b">B</div></body></html>"#,
    );
    let a = doc.element_by_id("a").unwrap().unwrap();
    let b = doc.element_by_id("b").unwrap().unwrap();
    doc.set_rect(a, Rect::new(0.0, -50.0, 100.0, 20.0));
    doc.set_rect(b, visible());
    let mut engine = Engine::new(doc, MessageLog::new());

    let summary = engine.invoke("byClass", &["row"]).unwrap();

    assert_eq!(summary.reported, 1);
    assert_eq!(
        messages(&engine),
        vec![
            "b;,B;,null;,row;,DIV;,10;,10;,100;,20;,class::row#$id::b",
            SENTINEL
        ]
    );
}

#[test]
fn click_dispatches_once_on_the_first_match_and_reports_nothing() {
    init_tracing();
    let doc = laid_out(
        r#"<body><button id="first">One</button><button id="second">Two</button></body>"#,
        &[("button", visible())],
    );
    let mut engine = Engine::new(doc, MessageLog::new());

    let summary = engine.invoke("byTag", &["button", "true"]).unwrap();

    let first = engine.document().element_by_id("first").unwrap().unwrap();
    assert_eq!(engine.document().clicks().len(), 1);
    assert_eq!(engine.document().clicks()[0].0, first);
    assert_eq!(engine.document().clicks()[0].1, MouseEvent::primary_click());
    assert_eq!(summary.target, Some(first));
    assert_eq!(messages(&engine), vec![SENTINEL]);
}

#[test]
fn click_on_a_miss_dispatches_nothing_but_still_terminates() {
    let doc = laid_out(r#"<body><a id="link">x</a></body>"#, &[("a", visible())]);
    let mut engine = Engine::new(doc, MessageLog::new());

    let summary = engine.click("id:missing").unwrap();

    assert!(engine.document().clicks().is_empty());
    assert_eq!(summary.target, None);
    assert_eq!(messages(&engine), vec![SENTINEL]);
}

#[test]
fn click_on_text_lands_on_the_containing_element() {
    let doc = laid_out(
        r#"<body><a id="login"> Sign in </a></body>"#,
        &[("a", visible())],
    );
    let mut engine = Engine::new(doc, MessageLog::new());

    engine.invoke("byText", &["Sign in", "true"]).unwrap();

    let login = engine.document().element_by_id("login").unwrap().unwrap();
    assert_eq!(engine.document().clicks().len(), 1);
    assert_eq!(engine.document().clicks()[0].0, login);
}

#[test]
fn set_text_touches_only_the_first_match() {
    let doc = laid_out(
        r#"<body><input id="a" name="q"><input id="b" name="q"></body>"#,
        &[("input", visible())],
    );
    let mut engine = Engine::new(doc, MessageLog::new());

    engine.set_text("name:q", "hello").unwrap();

    let a = engine.document().element_by_id("a").unwrap().unwrap();
    let b = engine.document().element_by_id("b").unwrap().unwrap();
    assert_eq!(engine.document().value(a).unwrap().as_deref(), Some("hello"));
    assert_eq!(engine.document().value(b).unwrap().as_deref(), Some(""));
    assert_eq!(messages(&engine), vec![SENTINEL]);
}

#[test]
fn a_miss_is_zero_records_then_termination() {
    let doc = laid_out(r#"<body><p class="x">x</p></body>"#, &[("p", visible())]);
    let mut engine = Engine::new(doc, MessageLog::new());

    for (name, pattern) in [
        ("byId", "nope"),
        ("byPath", "//section"),
        ("bySelector", "section"),
        ("byName", "nope"),
        ("byClass", "y"),
        ("byText", "nope"),
        ("byTag", "section"),
    ] {
        engine.sink_mut().clear();
        let summary = engine.invoke(name, &[pattern]).unwrap();
        assert_eq!(summary.reported, 0, "{name}");
        assert_eq!(messages(&engine), vec![SENTINEL], "{name}");
    }
}

#[test]
fn every_request_terminates_exactly_once_and_last() {
    let doc = laid_out(
        r#"<body><ul><li class="i">a</li><li class="i">b</li><li class="i">c</li></ul></body>"#,
        &[("li", visible())],
    );
    let mut engine = Engine::new(doc, MessageLog::new());

    for call in [
        ("allElements", vec![]),
        ("allTexts", vec![]),
        ("byClass", vec!["i"]),
        ("bySelector", vec!["li", "false"]),
        ("byPath", vec!["//li"]),
        ("byTag", vec!["LI"]),
    ] {
        engine.sink_mut().clear();
        engine.invoke(call.0, &call.1).unwrap();
        let out = messages(&engine);
        let sentinels = out.iter().filter(|m| **m == SENTINEL).count();
        assert_eq!(sentinels, 1, "{}", call.0);
        assert_eq!(out.last(), Some(&SENTINEL), "{}", call.0);
        assert_eq!(out.len(), 4, "{} should report three items", call.0);
    }
}

#[test]
fn rejected_requests_emit_nothing() {
    let doc = laid_out(r#"<body><p>x</p></body>"#, &[("p", visible())]);
    let mut engine = Engine::new(doc, MessageLog::new());

    assert!(matches!(
        engine.find("css:p[[["),
        Err(QueryError::InvalidSelector(_))
    ));
    assert!(matches!(
        engine.find("xpath://p["),
        Err(QueryError::InvalidPath(_))
    ));
    assert!(matches!(
        engine.find("no prefix at all"),
        Err(QueryError::InvalidSelector(_))
    ));
    assert!(matches!(
        engine.invoke("byWhatever", &["x"]),
        Err(QueryError::UnknownEntryPoint(_))
    ));
    assert!(matches!(
        engine.invoke("byId", &["x", "yes"]),
        Err(QueryError::InvalidArgument(_))
    ));
    assert!(engine.sink().messages().is_empty());
}

#[test]
fn detached_node_is_skipped_and_the_walk_continues() {
    init_tracing();
    let mut doc = laid_out(
        r#"<body><div class="row" id="a">A</div><div class="row" id="b">B</div></body>"#,
        &[(".row", visible())],
    );
    let a = doc.element_by_id("a").unwrap().unwrap();
    doc.detach(a);
    let mut engine = Engine::new(doc, MessageLog::new());

    let summary = engine.find("css:.row").unwrap();

    assert_eq!(summary.reported, 1);
    let out = messages(&engine);
    assert_eq!(out.len(), 2);
    assert_eq!(ElementRecord::parse(out[0]).unwrap().id.as_deref(), Some("b"));
    assert_eq!(out[1], SENTINEL);
}

#[test]
fn click_fault_on_the_first_match_is_swallowed() {
    let mut doc = laid_out(
        r#"<body><button id="a">A</button><button id="b">B</button></body>"#,
        &[("button", visible())],
    );
    let a = doc.element_by_id("a").unwrap().unwrap();
    doc.detach(a);
    let mut engine = Engine::new(doc, MessageLog::new());

    // the failed dispatch is swallowed; the request still terminates
    let summary = engine.click("css:button").unwrap();

    assert_eq!(summary.target, None);
    assert!(engine.document().clicks().is_empty());
    assert_eq!(messages(&engine), vec![SENTINEL]);

    engine.sink_mut().clear();
    engine.click("id:b").unwrap();
    assert_eq!(engine.document().clicks().len(), 1);
}

#[test]
fn all_elements_reports_only_laid_out_elements() {
    let doc = laid_out(
        r#"<html><head><title>t</title></head><body><p id="p">para</p><div id="hidden">h</div></body></html>"#,
        &[("p", visible())],
    );
    let mut engine = Engine::new(doc, MessageLog::new());

    let summary = engine.all_elements().unwrap();

    assert_eq!(summary.reported, 1);
    let record = ElementRecord::parse(messages(&engine)[0]).unwrap();
    assert_eq!(record.id.as_deref(), Some("p"));
    assert_eq!(record.tag_name.as_deref(), Some("P"));
}

#[test]
fn all_texts_reports_non_blank_body_text_without_attributes() {
    let doc = laid_out(
        r#"<html><head><title>Title</title></head><body><p id="p">Hello</p><span> </span></body></html>"#,
        &[("p", visible()), ("span", visible())],
    );
    let mut engine = Engine::new(doc, MessageLog::new());

    let summary = engine.all_texts().unwrap();

    assert_eq!(summary.reported, 1);
    let out = messages(&engine);
    assert_eq!(out[0], "p;,Hello;,null;,null;,P;,10;,10;,100;,20");
    assert_eq!(out[1], SENTINEL);
}

#[test]
fn sentinel_follows_the_configured_tool_name() {
    let doc = laid_out(r#"<body><p>x</p></body>"#, &[("p", visible())]);
    let config = EngineConfig::default().with_tool_name("webprobe");
    let mut engine = Engine::with_config(doc, MessageLog::new(), config);

    engine.find("tag:p").unwrap();

    assert_eq!(messages(&engine).last(), Some(&"webprobe-finished"));
}

#[test]
fn positive_origin_policy_hides_elements_at_the_edge() {
    let markup = r#"<body><p id="edge">x</p></body>"#;
    let edge = Rect::new(0.0, 0.0, 50.0, 10.0);

    let mut lenient = Engine::new(laid_out(markup, &[("p", edge)]), MessageLog::new());
    assert_eq!(lenient.find("id:edge").unwrap().reported, 1);

    let strict = EngineConfig::default().with_visibility(VisibilityPolicy::PositiveOrigin);
    let mut strict = Engine::with_config(laid_out(markup, &[("p", edge)]), MessageLog::new(), strict);
    assert_eq!(strict.find("id:edge").unwrap().reported, 0);
    assert_eq!(messages(&strict), vec![SENTINEL]);
}

#[test]
fn closures_work_as_sinks() {
    let doc = laid_out(r#"<body><p id="a">x</p></body>"#, &[("p", visible())]);
    let mut out: Vec<String> = Vec::new();
    {
        let mut engine = Engine::new(doc, |m: &str| out.push(m.to_string()));
        engine.find("#a").unwrap();
    }
    assert_eq!(out.len(), 2);
    assert_eq!(out[1], SENTINEL);
}
