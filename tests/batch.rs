//! End-to-end batch tests: whole request lists through `BatchEngine`,
//! checked against the responses and the resulting model state.

use m3_engine::config::EngineConfig;
use m3_engine::engine::BatchEngine;
use m3_engine::ids::ModelId;
use m3_engine::model::{ExpressionArgument, Model};
use m3_engine::request::{Arguments, Request, ValueArgument};
use m3_engine::response::{BatchResponse, MessageType, Signal};

const CURATOR: &str = "orcid:0000-0001-2345-6789";

fn engine() -> BatchEngine {
    BatchEngine::new(EngineConfig::default()).unwrap()
}

fn request(entity: &str, operation: &str, arguments: Arguments) -> Request {
    Request::new(entity, operation, arguments)
}

fn run(engine: &BatchEngine, requests: &[Request]) -> BatchResponse {
    engine.m3_batch(Some(CURATOR), Some("action"), None, requests, true)
}

fn values(pairs: &[(&str, &str)]) -> Option<Vec<ValueArgument>> {
    Some(pairs.iter().map(|(k, v)| ValueArgument::new(*k, *v)).collect())
}

/// Create a model with a title and return its id.
fn new_model(engine: &BatchEngine) -> String {
    let response = run(
        engine,
        &[request(
            "model",
            "add",
            Arguments {
                values: values(&[("title", "Apoptosis in liver")]),
                ..Default::default()
            },
        )],
    );
    assert!(response.is_success(), "{}", response.message);
    response.data.id.unwrap()
}

fn add_individual(model: &str, class: &str, variable: &str) -> Request {
    request(
        "individual",
        "add",
        Arguments {
            model_id: Some(model.to_string()),
            expressions: Some(vec![ExpressionArgument::class(class)]),
            assign_to_variable: Some(variable.to_string()),
            ..Default::default()
        },
    )
}

fn snapshot(engine: &BatchEngine, model: &str) -> Model {
    engine.store().snapshot(&ModelId::new(model)).unwrap()
}

#[test]
fn model_add_answers_with_rebuild() {
    let engine = engine();
    let response = run(
        &engine,
        &[request(
            "model",
            "add",
            Arguments {
                taxon_id: Some("NCBITaxon:9606".into()),
                ..Default::default()
            },
        )],
    );
    assert_eq!(response.message_type, MessageType::Success);
    assert_eq!(response.message, "success");
    assert_eq!(response.signal, Some(Signal::Rebuild));

    let id = response.data.id.unwrap();
    assert!(id.starts_with("gomodel:"));
    let annotations = response.data.annotations.unwrap();
    assert!(annotations.iter().any(|a| a.key == "taxon" && a.value == "NCBITaxon:9606"));
    assert!(annotations.iter().any(|a| a.key == "contributor" && a.value == CURATOR));
    assert!(annotations.iter().any(|a| a.key == "date"));
    assert!(response.data.individuals.unwrap().is_empty());
}

#[test]
fn variables_resolve_within_a_batch() {
    let engine = engine();
    let model = new_model(&engine);
    let response = run(
        &engine,
        &[
            add_individual(&model, "GO:0004672", "mf1"),
            request(
                "individual",
                "add-annotation",
                Arguments {
                    individual: Some("mf1".into()),
                    values: values(&[("comment", "kinase")]),
                    ..Default::default()
                },
            ),
        ],
    );
    assert!(response.is_success(), "{}", response.message);
    assert_eq!(response.signal, Some(Signal::Merge));

    let individuals = response.data.individuals.unwrap();
    assert_eq!(individuals.len(), 1);
    let rendered = &individuals[0];
    assert!(rendered.id.starts_with(&format!("{model}/")));
    assert!(rendered.annotations.iter().any(|a| a.key == "comment" && a.value == "kinase"));
    assert_eq!(rendered.types[0].id.as_deref(), Some("GO:0004672"));

    // Variables do not outlive their batch.
    let later = run(
        &engine,
        &[request(
            "individual",
            "get",
            Arguments {
                model_id: Some(model.clone()),
                individual: Some("mf1".into()),
                ..Default::default()
            },
        )],
    );
    assert_eq!(later.message_type, MessageType::Error);
    assert!(later.message.contains("Could not find an individual for id or variable: mf1"));
}

#[test]
fn meta_requests_cannot_follow_edits() {
    let engine = engine();
    let model = new_model(&engine);
    let response = run(
        &engine,
        &[
            request("relations", "get", Arguments::default()),
            request(
                "model",
                "get",
                Arguments {
                    model_id: Some(model.clone()),
                    ..Default::default()
                },
            ),
        ],
    );
    assert_eq!(response.message_type, MessageType::Error);
    assert_eq!(
        response.message,
        "Get Relations can only be combined with other meta operations."
    );
    assert!(response.signal.is_none());

    let reversed = run(
        &engine,
        &[
            request(
                "model",
                "get",
                Arguments {
                    model_id: Some(model),
                    ..Default::default()
                },
            ),
            request("evidence", "get", Arguments::default()),
        ],
    );
    assert_eq!(
        reversed.message,
        "Get Evidence can only be combined with other meta operations."
    );
}

#[test]
fn meta_requests_combine_into_one_payload() {
    let engine = engine();
    let response = engine.m3_batch(
        None,
        None,
        None,
        &[
            request("relations", "get", Arguments::default()),
            request("evidence", "get", Arguments::default()),
            request("model", "all-model-ids", Arguments::default()),
        ],
        false,
    );
    assert!(response.is_success(), "{}", response.message);
    assert_eq!(response.signal, Some(Signal::Meta));
    let meta = response.data.meta.unwrap();
    assert!(meta.relations.unwrap().iter().any(|r| r.id == "RO:0002333" && r.relevant));
    assert!(meta.evidence.unwrap().iter().any(|e| e.id == "ECO:0000314"));
    assert_eq!(meta.model_ids, Some(Vec::new()));
}

#[test]
fn store_without_contributor_fails_validation() {
    let engine = engine();
    // Anonymous callers leave no contributor behind.
    let created = engine.m3_batch(
        Some("anonymous"),
        None,
        None,
        &[request("model", "add", Arguments::default())],
        true,
    );
    let model = created.data.id.unwrap();

    let response = engine.m3_batch(
        None,
        None,
        None,
        &[request(
            "model",
            "store",
            Arguments {
                model_id: Some(model),
                ..Default::default()
            },
        )],
        true,
    );
    assert_eq!(response.message_type, MessageType::Error);
    assert_eq!(
        response.message,
        "Save model failed due to a failed validation of the model"
    );
    let commentary = response.commentary.unwrap();
    assert!(commentary.contains("title"));
    assert!(commentary.contains("no contributors"));
    assert_eq!(commentary.lines().count(), 2);
}

#[test]
fn undo_with_empty_history_is_an_error() {
    let engine = engine();
    let model = engine.store().generate_blank_model().unwrap();
    let response = run(
        &engine,
        &[request(
            "model",
            "undo",
            Arguments {
                model_id: Some(model.to_string()),
                ..Default::default()
            },
        )],
    );
    assert_eq!(response.message_type, MessageType::Error);
    assert_eq!(
        response.message,
        format!(
            "Could not successfully complete batch request. Exception: EmptyHistory. \
             Nothing to undo for model: {model}"
        )
    );
}

#[test]
fn unprivileged_edits_are_rejected_without_effect() {
    let engine = engine();
    let model = new_model(&engine);
    let before = snapshot(&engine, &model);

    let response = engine.m3_batch(
        Some(CURATOR),
        None,
        None,
        &[
            request(
                "model",
                "get",
                Arguments {
                    model_id: Some(model.clone()),
                    ..Default::default()
                },
            ),
            add_individual(&model, "GO:0004672", "mf1"),
        ],
        false,
    );
    assert_eq!(response.message_type, MessageType::Error);
    assert_eq!(
        response.message,
        "Insufficient permissions for the operation add on entity: individual"
    );
    assert_eq!(snapshot(&engine, &model), before);
}

#[test]
fn one_batch_addresses_one_model() {
    let engine = engine();
    let first = new_model(&engine);
    let second = new_model(&engine);
    let response = run(
        &engine,
        &[
            add_individual(&first, "GO:0004672", "a"),
            add_individual(&second, "GO:0004672", "b"),
        ],
    );
    assert_eq!(response.message_type, MessageType::Error);
    assert!(response.message.contains("Exception: MultipleModelIds."));
    assert_eq!(snapshot(&engine, &second).individual_count(), 0);
    // The first request already ran and stays applied.
    assert_eq!(snapshot(&engine, &first).individual_count(), 1);
}

#[test]
fn undo_and_redo_restore_model_states() {
    let engine = engine();
    let model = new_model(&engine);
    let before = snapshot(&engine, &model);

    let edit = run(
        &engine,
        &[
            add_individual(&model, "GO:0004672", "mf"),
            add_individual(&model, "GO:0006915", "bp"),
            request(
                "edge",
                "add",
                Arguments {
                    subject: Some("mf".into()),
                    predicate: Some("BFO:0000050".into()),
                    object: Some("bp".into()),
                    ..Default::default()
                },
            ),
        ],
    );
    assert!(edit.is_success(), "{}", edit.message);
    assert_eq!(edit.data.facts.as_ref().map(Vec::len), Some(1));
    let after = snapshot(&engine, &model);
    assert_ne!(after, before);

    let model_arg = || Arguments {
        model_id: Some(model.clone()),
        ..Default::default()
    };

    // Three requests, three history entries.
    for _ in 0..3 {
        let undo = run(&engine, &[request("model", "undo", model_arg())]);
        assert!(undo.is_success(), "{}", undo.message);
        assert_eq!(undo.signal, Some(Signal::Rebuild));
    }
    // The fourth undo reverts the model/add annotations of `new_model`.
    let undo = run(&engine, &[request("model", "undo", model_arg())]);
    assert!(undo.is_success(), "{}", undo.message);
    assert!(snapshot(&engine, &model).annotations().is_empty());

    let redo = run(&engine, &[request("model", "redo", model_arg())]);
    assert!(redo.is_success(), "{}", redo.message);
    assert_eq!(snapshot(&engine, &model), before);

    for _ in 0..3 {
        let redo = run(&engine, &[request("model", "redo", model_arg())]);
        assert!(redo.is_success(), "{}", redo.message);
    }
    assert_eq!(snapshot(&engine, &model), after);

    let history = engine.m3_batch(
        None,
        None,
        None,
        &[request("model", "get-undo-redo", model_arg())],
        true,
    );
    assert_eq!(history.signal, Some(Signal::Meta));
    assert_eq!(history.data.undo.as_ref().map(Vec::len), Some(4));
    assert_eq!(history.data.redo.as_ref().map(Vec::len), Some(0));
}

#[test]
fn deleting_an_individual_sweeps_its_evidence() {
    let engine = engine();
    let model = new_model(&engine);

    let setup = run(
        &engine,
        &[
            add_individual(&model, "GO:0004672", "mf"),
            add_individual(&model, "UniProtKB:P04637", "gp"),
            request(
                "individual",
                "add",
                Arguments {
                    expressions: Some(vec![ExpressionArgument::class("ECO:0000314")]),
                    values: values(&[("source", "PMID:12345")]),
                    assign_to_variable: Some("ev".into()),
                    ..Default::default()
                },
            ),
            request(
                "edge",
                "add",
                Arguments {
                    subject: Some("mf".into()),
                    predicate: Some("RO:0002333".into()),
                    object: Some("gp".into()),
                    values: values(&[("evidence", "ev")]),
                    ..Default::default()
                },
            ),
        ],
    );
    assert!(setup.is_success(), "{}", setup.message);
    assert_eq!(snapshot(&engine, &model).individual_count(), 3);

    let facts = setup.data.facts.unwrap();
    let fact = &facts[0];
    let gene_product = fact.object.clone();
    let evidence = fact
        .annotations
        .iter()
        .find(|a| a.key == "evidence")
        .unwrap();
    assert_eq!(evidence.value_type.as_deref(), Some("IRI"));

    let removal = run(
        &engine,
        &[request(
            "individual",
            "remove",
            Arguments {
                model_id: Some(model.clone()),
                individual: Some(gene_product),
                ..Default::default()
            },
        )],
    );
    assert!(removal.is_success(), "{}", removal.message);
    assert_eq!(removal.signal, Some(Signal::Rebuild));
    assert_eq!(removal.data.individuals.as_ref().map(Vec::len), Some(1));
    assert_eq!(removal.data.facts.as_ref().map(Vec::len), Some(0));

    let after = snapshot(&engine, &model);
    assert_eq!(after.individual_count(), 1);
    assert_eq!(after.fact_count(), 0);
}

#[test]
fn removing_evidence_keeps_individuals_still_used_by_facts() {
    let engine = engine();
    let model = new_model(&engine);
    let edge = |subject: &str, object: &str, evidence: Option<&str>| {
        request(
            "edge",
            "add",
            Arguments {
                subject: Some(subject.into()),
                predicate: Some("BFO:0000050".into()),
                object: Some(object.into()),
                values: evidence.and_then(|ev| values(&[("evidence", ev)])),
                ..Default::default()
            },
        )
    };

    let setup = run(
        &engine,
        &[
            add_individual(&model, "GO:0004672", "mf"),
            add_individual(&model, "GO:0006915", "bp"),
            add_individual(&model, "ECO:0000314", "ev"),
            edge("mf", "bp", Some("ev")),
            edge("ev", "bp", None),
        ],
    );
    assert!(setup.is_success(), "{}", setup.message);
    let facts = setup.data.facts.unwrap();
    assert_eq!(facts.len(), 2);
    let evidenced = facts
        .iter()
        .find(|f| f.annotations.iter().any(|a| a.key == "evidence"))
        .unwrap();
    let evidence = evidenced
        .annotations
        .iter()
        .find(|a| a.key == "evidence")
        .unwrap()
        .value
        .clone();

    let removal = run(
        &engine,
        &[request(
            "edge",
            "remove-annotation",
            Arguments {
                model_id: Some(model.clone()),
                subject: Some(evidenced.subject.clone()),
                predicate: Some(evidenced.property.clone()),
                object: Some(evidenced.object.clone()),
                values: values(&[("evidence", evidence.as_str())]),
                ..Default::default()
            },
        )],
    );
    assert!(removal.is_success(), "{}", removal.message);

    let after = snapshot(&engine, &model);
    assert_eq!(after.individual_count(), 3);
    assert_eq!(after.fact_count(), 2);
    assert!(after.individuals().any(|i| i.as_str() == evidence));
}

#[test]
fn self_edge_through_a_variable_merges() {
    let engine = engine();
    let model = new_model(&engine);
    let response = run(
        &engine,
        &[
            add_individual(&model, "GO:0004672", "mf1"),
            request(
                "edge",
                "add",
                Arguments {
                    subject: Some("mf1".into()),
                    predicate: Some("BFO:0000050".into()),
                    object: Some("mf1".into()),
                    ..Default::default()
                },
            ),
        ],
    );
    assert!(response.is_success(), "{}", response.message);
    assert_eq!(response.signal, Some(Signal::Merge));
    let individuals = response.data.individuals.unwrap();
    assert_eq!(individuals.len(), 1);
    let facts = response.data.facts.unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].subject, individuals[0].id);
    assert_eq!(facts[0].object, individuals[0].id);
}

#[test]
fn disjoint_types_flag_the_model_inconsistent() {
    let engine = engine();
    let model = new_model(&engine);

    let consistent = run(&engine, &[add_individual(&model, "GO:0003674", "x")]);
    assert!(consistent.is_success(), "{}", consistent.message);
    assert_eq!(consistent.data.inconsistent_flag, None);
    let individual = consistent.data.individuals.unwrap().remove(0).id;

    let response = run(
        &engine,
        &[request(
            "individual",
            "add-type",
            Arguments {
                model_id: Some(model),
                individual: Some(individual),
                expressions: Some(vec![ExpressionArgument::class("GO:0008150")]),
                ..Default::default()
            },
        )],
    );
    assert!(response.is_success(), "{}", response.message);
    assert_eq!(response.data.inconsistent_flag, Some(true));
}

#[test]
fn inferred_types_follow_the_vocabulary() {
    let engine = engine();
    let model = new_model(&engine);
    let response = run(&engine, &[add_individual(&model, "GO:0009653", "x")]);
    let inferred = response.data.individuals_inferred.unwrap();
    assert_eq!(inferred.len(), 1);
    let ids: Vec<_> = inferred[0].types.iter().filter_map(|t| t.id.as_deref()).collect();
    assert!(ids.contains(&"GO:0048856"));
    assert!(ids.contains(&"GO:0008150"));
}

#[test]
fn export_and_import_move_a_model() {
    let source = engine();
    let model = new_model(&source);
    let built = run(&source, &[add_individual(&model, "GO:0004672", "mf")]);
    assert!(built.is_success(), "{}", built.message);

    let exported = source.m3_batch(
        None,
        None,
        None,
        &[request(
            "model",
            "export",
            Arguments {
                model_id: Some(model.clone()),
                ..Default::default()
            },
        )],
        false,
    );
    assert_eq!(exported.signal, Some(Signal::Meta));
    let document = exported.data.export_model.unwrap();

    let target = engine();
    let imported = run(
        &target,
        &[request(
            "model",
            "import",
            Arguments {
                import_model: Some(document),
                ..Default::default()
            },
        )],
    );
    assert!(imported.is_success(), "{}", imported.message);
    assert_eq!(imported.signal, Some(Signal::Rebuild));
    assert_eq!(imported.data.id.as_deref(), Some(model.as_str()));
    assert_eq!(imported.data.individuals.map(|i| i.len()), Some(1));
}

#[test]
fn legacy_export_writes_gaf_rows() {
    let engine = engine();
    let model = new_model(&engine);
    let setup = run(
        &engine,
        &[
            add_individual(&model, "GO:0004672", "mf"),
            add_individual(&model, "UniProtKB:P04637", "gp"),
            request(
                "edge",
                "add",
                Arguments {
                    subject: Some("mf".into()),
                    predicate: Some("RO:0002333".into()),
                    object: Some("gp".into()),
                    ..Default::default()
                },
            ),
        ],
    );
    assert!(setup.is_success(), "{}", setup.message);

    let response = run(
        &engine,
        &[request(
            "model",
            "export-legacy",
            Arguments {
                model_id: Some(model.clone()),
                format: Some("gaf".into()),
                ..Default::default()
            },
        )],
    );
    let gaf = response.data.export_model.unwrap();
    assert!(gaf.starts_with("!gaf-version: 2.1"));
    assert!(gaf.contains("GO:0004672"));

    let rejected = run(
        &engine,
        &[request(
            "model",
            "export-legacy",
            Arguments {
                model_id: Some(model),
                format: Some("owl".into()),
                ..Default::default()
            },
        )],
    );
    assert_eq!(rejected.message_type, MessageType::Error);
    assert!(rejected.message.contains("Unsupported export format: owl"));
}

#[test]
fn all_model_meta_lists_shorthand_annotations() {
    let engine = engine();
    let model = new_model(&engine);
    let response = run(&engine, &[request("model", "all-model-meta", Arguments::default())]);
    let meta = response.data.meta.unwrap().models_meta.unwrap();
    let entry = &meta[&model];
    assert_eq!(entry["title"], vec!["Apoptosis in liver".to_string()]);
    assert_eq!(entry["contributor"], vec![CURATOR.to_string()]);
}

#[test]
fn unknown_tokens_are_rejected() {
    let engine = engine();
    let response = run(&engine, &[request("gene", "get", Arguments::default())]);
    assert_eq!(response.message_type, MessageType::Error);
    assert!(response.message.contains("No valid value for entity type: gene"));

    let unsupported = run(&engine, &[request("edge", "get", Arguments::default())]);
    assert_eq!(
        unsupported.message,
        "Unknown operation: get for entity: edge"
    );
}
