//! Page through a small in-memory corpus with resume tokens
//!
//! Run with: RUST_LOG=info cargo run --example paging

use shardquery::engine::raw_hit;
use shardquery::{
    FilterSpec, MemoryEngine, PageRequest, Pager, RawHit, SearchConfig, SearchMode,
    metadata_counts,
};

const CONFIG: &str = r#"{
    "limits": {"flush": 3, "results": 20},
    "corpora": [
        {
            "id": "lassy",
            "shards": [
                {"machine": "localhost", "port": 1984, "component": "WIKI"},
                {"machine": "localhost", "port": 1984, "component": "WSU"},
                {"machine": "localhost", "port": 1984, "component": "WRPE"}
            ],
            "component_groups": [
                {"id": "web", "description": "Web text", "components": ["WIKI", "WSU"]}
            ],
            "metadata": [
                {"field": "genre", "type": "text", "facet": "checkbox"}
            ],
            "shape_index": {
                "smainhd%ww_su%np": ["WSU"]
            }
        }
    ]
}"#;

fn hits(component: &str, genre: &str, n: usize) -> Vec<RawHit> {
    (0..n)
        .map(|i| {
            let id = format!("{}-{}.p.1.s.{}-endPos=all+match=1", component.to_lowercase(), i, i);
            let mut hit = raw_hit(&id, "de kat zit op de mat");
            hit.node_ids = "2-3".to_string();
            hit.begins = "1-2".to_string();
            hit.meta_xml = format!(r#"<meta type="text" name="genre" value="{}"/>"#, genre);
            hit
        })
        .collect()
}

fn main() {
    env_logger::init();

    let config = SearchConfig::from_json_str(CONFIG).expect("Failed to load config");
    let engine = MemoryEngine::new()
        .with_hits("WIKI", hits("WIKI", "encyclopedia", 4))
        .with_hits("WSU", hits("WSU", "news", 5))
        .with_hits("WRPE", hits("WRPE", "press", 2));
    let pager = Pager::new(&config, &engine);

    let pattern = r#"node[@cat="smain" and node[@rel="su" and @cat="np"] and node[@rel="hd" and @pt="ww"]]"#;
    let request = PageRequest::new("lassy", pattern).with_components(&["web"]);

    let mut current = request.clone();
    let mut page_number = 1;
    loop {
        let page = pager.search_page(&current).expect("Search failed");
        println!("Page {} ({} hits)", page_number, page.hits.len());
        for hit in &page.hits {
            println!("  [{}] {}  {}", hit.shard_id, hit.file_id, hit.highlighted_sentence);
        }
        match page.resume_token {
            Some(token) => current = request.resumed(&token),
            None => break,
        }
        page_number += 1;
    }

    println!();
    println!("Queries sent:");
    for query in engine.queries() {
        println!(
            "  {} offset={} limit={} {}",
            query.component, query.offset, query.limit, query.pattern
        );
    }

    let filtered = PageRequest::new("lassy", r#"//node[@cat="np"]"#)
        .with_filters(vec![FilterSpec::Single {
            field: "genre".to_string(),
            value: "news".to_string(),
        }])
        .with_mode(SearchMode::Normal);
    let state = pager.start(&filtered).expect("Failed to start session");
    println!();
    println!("Filtered pattern: {}", state.query_pattern());

    let all = pager
        .collect_all(&PageRequest::new("lassy", "//node"))
        .expect("Search failed");
    println!();
    println!("Genres over {} hits:", all.len());
    for (field, values) in metadata_counts(&all) {
        for (value, count) in values {
            println!("  {}={}: {}", field, value, count);
        }
    }
}
