use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pact_mock_server::model::{
    Category, Contract, DocPath, HttpPartBuilder, Interaction, MatchingRule, Request,
};
use pact_mock_server::{match_request, select_interaction};
use serde_json::json;

fn create_interaction(id: usize) -> Interaction {
    let mut interaction = Interaction::new(format!("interaction {id}"));
    interaction
        .request
        .with_method_and_path("POST", &format!("/api/v1/endpoint{id}"))
        .with_query_parameter("page", 0, "1")
        .with_header("Accept", 0, "application/json")
        .with_body(
            Some("application/json"),
            &json!({"id": id, "name": "item", "tags": ["a", "b"]}).to_string(),
        );
    interaction
}

fn create_contract(count: usize) -> Contract {
    let mut contract = Contract::new("bench-consumer", "bench-provider");
    for i in 0..count {
        contract.add_interaction(create_interaction(i));
    }
    contract
}

fn request_for(id: usize) -> Request {
    create_interaction(id).request
}

fn nested_body(depth: usize, width: usize) -> serde_json::Value {
    if depth == 0 {
        return json!({"value": 42, "label": "leaf"});
    }
    let children: Vec<_> = (0..width).map(|_| nested_body(depth - 1, width)).collect();
    json!({"children": children, "count": width})
}

fn bench_interaction_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("interaction_selection");

    for count in [10, 50, 100, 500].iter() {
        let contract = create_contract(*count);

        // Best case: the first interaction matches
        let first = request_for(0);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("match_first", count), count, |b, _| {
            b.iter(|| select_interaction(black_box(&contract), black_box(&first)));
        });

        // Worst case: the last interaction matches
        let last = request_for(count - 1);
        group.bench_with_input(BenchmarkId::new("match_last", count), count, |b, _| {
            b.iter(|| select_interaction(black_box(&contract), black_box(&last)));
        });

        // Every interaction is scored to find the closest
        let mut none = Request::default();
        none.with_method_and_path("GET", "/not/found");
        group.bench_with_input(BenchmarkId::new("match_none", count), count, |b, _| {
            b.iter(|| select_interaction(black_box(&contract), black_box(&none)));
        });
    }

    group.finish();
}

fn bench_body_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("body_matching");

    for depth in [1, 3, 5].iter() {
        let body = nested_body(*depth, 3).to_string();

        let mut expected = Request::default();
        expected.with_body(Some("application/json"), &body);
        let mut actual = Request::default();
        actual.with_body(Some("application/json"), &body);

        group.bench_with_input(BenchmarkId::new("exact", depth), depth, |b, _| {
            b.iter(|| match_request(black_box(&expected), black_box(&actual)));
        });

        let mut typed = expected.clone();
        typed.matching_rules.add_rule(
            Category::Body,
            DocPath::root(),
            MatchingRule::Type,
        );
        group.bench_with_input(BenchmarkId::new("type_rule", depth), depth, |b, _| {
            b.iter(|| match_request(black_box(&typed), black_box(&actual)));
        });
    }

    group.finish();
}

fn bench_regex_rule(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_rule");

    let mut expected = Request::default();
    expected.with_method_and_path("GET", "/product/1");
    expected.matching_rules.add_rule(
        Category::Path,
        DocPath::root(),
        MatchingRule::Regex(pact_mock_server::model::RegexRule::new(r"/product/\d+").unwrap()),
    );
    let mut actual = Request::default();
    actual.with_method_and_path("GET", "/product/123456");

    group.throughput(Throughput::Elements(1));
    group.bench_function("path_regex", |b| {
        b.iter(|| match_request(black_box(&expected), black_box(&actual)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_interaction_selection,
    bench_body_matching,
    bench_regex_rule
);
criterion_main!(benches);
