//! Drives the engine through its public API the way a native driver does:
//! issue a call, read the message stream, wait for the sentinel.

use std::time::Duration;

use domscout::collector::DEFAULT_COLLECT_TIMEOUT;
use domscout::{
    ChannelSink, Document, ElementCollector, ElementRecord, Engine, EngineConfig, HtmlDocument,
    LayoutEntry, MessageLog, Rect, Request,
};
use tokio::sync::mpsc;

const LOGIN_PAGE: &str = r#"<html><body><form id="login"><label id="user-label">User</label><input class="field" id="user" name="user"><input class="field" id="pass" name="pass" type="password"><button class="primary" id="submit">Sign in</button></form><a class="help" href="/help" id="help">Help</a></body></html>"#;

fn login_page() -> HtmlDocument {
    let layout: Vec<LayoutEntry> = serde_json::from_str(
        r##"[
            {"selector": "form", "rect": {"left": 0, "top": 0, "width": 400, "height": 300}},
            {"selector": "label", "rect": {"left": 20, "top": 20, "width": 80, "height": 20}},
            {"selector": "#user", "rect": {"left": 20, "top": 50, "width": 200, "height": 30}},
            {"selector": "#pass", "rect": {"left": 20, "top": 90, "width": 200, "height": 30}},
            {"selector": "button", "rect": {"left": 20, "top": 140, "width": 120, "height": 40},
             "text_rect": {"left": 40, "top": 150, "width": 60, "height": 16}},
            {"selector": "a", "rect": {"left": 20, "top": -40, "width": 50, "height": 16}}
        ]"##,
    )
    .expect("layout should deserialize");
    let mut doc = HtmlDocument::parse(LOGIN_PAGE);
    doc.apply_layout(&layout).expect("layout should apply");
    doc
}

#[test]
fn records_round_trip_through_the_collector() {
    let mut engine = Engine::new(login_page(), MessageLog::new());
    engine.invoke("byClass", &["field"]).unwrap();

    let mut collector = ElementCollector::for_config(engine.config());
    for message in engine.sink().messages() {
        assert!(collector.accept(message), "{message:?} should belong to the protocol");
    }
    assert!(collector.is_finished());

    let elements = collector.elements();
    assert_eq!(elements.len(), 2);
    assert_eq!(elements[0].id.as_deref(), Some("user"));
    assert_eq!(elements[1].attributes.get("type").map(String::as_str), Some("password"));
    assert_eq!(elements[0].tag_name.as_deref(), Some("INPUT"));

    // every record parses back into exactly what the reporter saw
    for message in &engine.sink().messages()[..2] {
        let record = ElementRecord::parse(message).unwrap();
        assert_eq!(record.encode(), *message);
    }
}

#[test]
fn off_screen_links_are_not_reported() {
    let mut engine = Engine::new(login_page(), MessageLog::new());
    let summary = engine.invoke("byPath", &["//a[@href]"]).unwrap();
    assert_eq!(summary.reported, 0);
    assert_eq!(engine.sink().messages(), ["domscout-finished"]);
}

#[test]
fn text_reports_use_the_text_range() {
    let mut engine = Engine::new(login_page(), MessageLog::new());
    engine.invoke("byText", &["Sign in"]).unwrap();

    let record = ElementRecord::parse(&engine.sink().messages()[0]).unwrap();
    assert_eq!(record.id.as_deref(), Some("submit"));
    assert_eq!(record.rect, Rect::new(40.0, 150.0, 60.0, 16.0));
    assert_eq!(record.attributes, None);
}

#[test]
fn login_flow_by_calls() {
    let mut engine = Engine::new(login_page(), MessageLog::new());

    engine.invoke("setTextByName", &["user", "alice"]).unwrap();
    engine.invoke("setTextBySelector", &["input[type=password]", "s3cret"]).unwrap();
    engine.invoke("bySelector", &["button.primary", "true"]).unwrap();

    let doc = engine.document();
    let user = doc.element_by_id("user").unwrap().unwrap();
    let pass = doc.element_by_id("pass").unwrap().unwrap();
    let submit = doc.element_by_id("submit").unwrap().unwrap();
    assert_eq!(doc.value(user).unwrap().as_deref(), Some("alice"));
    assert_eq!(doc.value(pass).unwrap().as_deref(), Some("s3cret"));
    assert_eq!(doc.clicks().len(), 1);
    assert_eq!(doc.clicks()[0].0, submit);
    assert_eq!(engine.sink().messages(), ["domscout-finished"; 3]);
}

#[tokio::test]
async fn channel_sink_feeds_an_async_collector() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = EngineConfig::default().with_tool_name("webprobe");
    // unrelated console output shares the channel
    tx.send("console: page ready".to_string()).unwrap();
    let mut engine = Engine::with_config(login_page(), ChannelSink::new(tx), config.clone());

    engine.execute(&Request::find("css:input")).unwrap();

    let mut collector = ElementCollector::for_config(&config);
    let finished = collector.collect_from(&mut rx, DEFAULT_COLLECT_TIMEOUT).await;
    assert!(finished);
    assert_eq!(collector.elements().len(), 2);

    let user = &collector.elements()[0];
    assert_eq!(user.location_on_screen((0, 100), 1.5), (180, 197));
}

#[tokio::test]
async fn collector_gives_up_without_a_sentinel() {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tx.send("user;,;,user;,field;,INPUT;,20;,50;,200;,30;,".to_string())
        .unwrap();

    let mut collector = ElementCollector::new("domscout-finished");
    let finished = collector
        .collect_from(&mut rx, Duration::from_millis(50))
        .await;

    assert!(!finished);
    assert_eq!(collector.elements().len(), 1);
    drop(tx);
}

#[test]
fn delimiters_inside_page_content_do_not_lose_elements() {
    let mut doc = HtmlDocument::parse(
        r#"<html><body><a id="x" href="/page#$top">go</a><a id="y">a;,b</a></body></html>"#,
    );
    for css in ["#x", "#y"] {
        let node = doc.find_first(css).unwrap().expect("link exists");
        doc.set_rect(node, Rect::new(1.0, 1.0, 10.0, 10.0));
    }
    let mut engine = Engine::new(doc, ElementCollector::new("domscout-finished"));

    let summary = engine.invoke("byTag", &["a"]).unwrap();

    let (_, mut collector) = engine.into_parts();
    assert!(collector.is_finished());
    let elements = collector.take_elements();
    assert_eq!(elements.len(), summary.reported);
    assert_eq!(elements[0].attributes.get("href").map(String::as_str), Some("/page#$top"));
    assert_eq!(elements[1].id.as_deref(), Some("y"));
    assert_eq!(elements[1].text, "a;,b");
}

#[test]
fn layout_changes_between_requests_are_seen() {
    let mut engine = Engine::new(login_page(), MessageLog::new());
    assert_eq!(engine.invoke("byId", &["help"]).unwrap().reported, 0);

    let help = engine.document().find_first("a.help").unwrap().expect("help link");
    engine
        .document_mut()
        .set_rect(help, Rect::new(20.0, 200.0, 50.0, 16.0));
    engine.sink_mut().clear();

    assert_eq!(engine.invoke("byId", &["help"]).unwrap().reported, 1);
    assert_eq!(engine.sink().messages().len(), 2);
}
