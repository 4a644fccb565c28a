use std::hint::black_box;

use contentsearch::compiler::{compile, CompileContext};
use contentsearch::parser::parse;
use contentsearch::registry;
use contentsearch::request::{ParameterPool, SearchRequest};
use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::{json, Map, Value};

const QUERY: &str = "(name like @name or !keywordlike(@kw)) and not id in @seen.id and !notdeleted() \
                     and !permissionlimit(@groups, id, R)";

fn pool(rows: usize) -> ParameterPool {
    let seen: Vec<Value> = (0..rows).map(|i| json!({ "id": i, "name": format!("page {i}") })).collect();
    let mut values = Map::new();
    values.insert("name".into(), json!("%news%"));
    values.insert("kw".into(), json!("sport%"));
    values.insert("groups".into(), json!([0, 1, 10]));
    values.insert("seen".into(), Value::Array(seen));
    ParameterPool::new(&values)
}

fn parsing(c: &mut Criterion) {
    c.bench_function("parse filter", |b| b.iter(|| parse(black_box(QUERY))));
}

fn compiling(c: &mut Criterion) {
    let request = SearchRequest::new("page").fields("id,name,keywords,commentCount").query(QUERY).order("name_desc");
    for rows in [10, 1000] {
        let pool = pool(rows);
        let context = CompileContext { registry: registry::standard(), pool: &pool, prefix: "_bench", max_limit: 1000 };
        c.bench_function(&format!("compile request, {rows} earlier rows"), |b| {
            b.iter(|| compile(black_box(&request), &context))
        });
    }
}

criterion_group!(benches, parsing, compiling);
criterion_main!(benches);
