mod common;

use common::{MockTransport, context_with, file_context, open};
use http::Method;
use restcrud::crud::{EndpointSpec, RequestBody, ResponseType, RequiredFields};
use restcrud::snapshot::SnapshotSlot;
use restcrud::{
    Crud, CrudContext, CrudDefaults, CrudError, CrudOptions, CustomEndpoint, FormStatus, HookName,
    MemoryStorage, Operation, TransportError, UploadFile, hook_fn,
};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn rows(count: usize) -> Value {
    Value::Array((0..count).map(|i| json!({"id": i})).collect())
}

fn ids(page: &Value) -> Vec<i64> {
    page.as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_query_sends_layered_params_with_pagination() {
    let transport = MockTransport::replying(json!({"rows": [], "total": 0}));
    let options = CrudOptions::new("/users")
        .query("status", "active")
        .query("role", "admin")
        .page_size(20);
    let mut crud = open(transport.clone(), options).await;
    crud.state_mut().query.insert("role".into(), json!("guest"));

    let mut overrides = Map::new();
    overrides.insert("status".into(), json!("archived"));
    let response = crud.to_query(Some(overrides)).await.unwrap();

    assert_eq!(response, Some(json!({"rows": [], "total": 0})));
    let request = transport.last();
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.url, "/users");
    let params = request.params.unwrap();
    assert_eq!(params["status"], json!("archived"));
    assert_eq!(params["role"], json!("guest"));
    assert_eq!(params["currentPage"], json!(1));
    assert_eq!(params["pageSize"], json!(20));
    assert!(!crud.state().loading.any());
}

#[tokio::test]
async fn test_before_hook_cancellation_leaves_state_untouched() {
    let transport = MockTransport::replying(json!({}));
    let mut crud = open(transport.clone(), CrudOptions::new("/users").row_key("id")).await;
    crud.register_endpoint("publish", CustomEndpoint::new("/publish", Method::POST))
        .unwrap();
    for hook in [
        HookName::BEFORE_QUERY,
        HookName::BEFORE_DELETE,
        HookName::BEFORE_EDIT_QUERY,
        HookName::BEFORE_VIEW_QUERY,
        HookName::BEFORE_ADD_OR_UPDATE_QUERY,
        HookName::BEFORE_ADD,
        HookName::BEFORE_EXPORT,
        HookName::BEFORE_IMPORT,
        HookName::BEFORE_SORT,
        HookName::BEFORE_COPY,
        HookName::before("publish"),
    ] {
        crud.on(hook, hook_fn(|ctx| {
            ctx.cancel();
            Ok(())
        }))
        .unwrap();
    }
    let before = crud.state().clone();

    assert_eq!(crud.to_query(None).await.unwrap(), None);
    assert_eq!(crud.to_delete(&[json!({"id": 1})]).await.unwrap(), None);
    assert_eq!(crud.to_update(&json!({"id": 1})).await.unwrap(), None);
    assert_eq!(crud.to_view(&json!({"id": 1})).await.unwrap(), None);
    assert_eq!(crud.to_add_or_update(Some(&json!({"id": 1}))).await.unwrap(), None);
    assert_eq!(crud.to_add(Value::Null).await.unwrap(), None);
    assert_eq!(crud.to_export().await.unwrap(), None);
    assert_eq!(
        crud.to_import(vec![UploadFile::new("a.csv", b"1".to_vec())])
            .await
            .unwrap(),
        None
    );
    assert_eq!(crud.to_sort().await.unwrap(), None);
    assert_eq!(crud.to_copy(&[json!({"id": 1})]).await.unwrap(), None);
    assert_eq!(
        crud.invoke_endpoint("publish", Map::new(), Some(json!({"id": 1})))
            .await
            .unwrap(),
        None
    );

    assert_eq!(transport.count(), 0);
    assert_eq!(crud.state().form_status, before.form_status);
    assert_eq!(crud.state().editing_id, before.editing_id);
    assert_eq!(crud.state().loading, before.loading);
}

#[tokio::test]
async fn test_cancelled_submit_keeps_form_mode() {
    let transport = MockTransport::replying(json!({"id": 1}));
    let mut crud = open(transport.clone(), CrudOptions::new("/users")).await;
    crud.on(HookName::BEFORE_SUBMIT, hook_fn(|ctx| {
        ctx.cancel();
        Ok(())
    }))
    .unwrap();
    crud.to_add(Value::Null).await.unwrap();
    crud.state_mut().form = json!({"name": "new"});
    let loading = crud.state().loading.clone();

    assert_eq!(crud.submit().await.unwrap(), None);

    assert_eq!(transport.count(), 0);
    assert_eq!(crud.state().form_status, FormStatus::Adding);
    assert_eq!(crud.state().form, json!({"name": "new"}));
    assert_eq!(crud.state().loading, loading);
}

#[tokio::test]
async fn test_submit_outside_editable_modes_is_a_noop() {
    let transport = MockTransport::replying(json!({"ok": true}));
    let mut crud = open(transport.clone(), CrudOptions::new("/users").row_key("id")).await;

    assert_eq!(crud.submit().await.unwrap(), None);

    crud.on(HookName::BEFORE_VIEW_QUERY, hook_fn(|ctx| {
        ctx.skip_fetch();
        Ok(())
    }))
    .unwrap();
    crud.to_view(&json!({"id": 3})).await.unwrap();
    assert_eq!(crud.state().form_status, FormStatus::Viewing);

    assert_eq!(crud.submit().await.unwrap(), None);
    assert_eq!(crud.submit_update().await.unwrap(), None);
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn test_frontend_paging_slices_cached_result() {
    let transport = MockTransport::replying(rows(25));
    let options = CrudOptions::new("/users").frontend(true).page_size(10);
    let mut crud = open(transport.clone(), options).await;

    let first = crud.to_query(None).await.unwrap().unwrap();
    assert_eq!(ids(&first), (0..10).collect::<Vec<_>>());
    assert_eq!(crud.state().pagination.total, 25);
    assert!(transport.last().params.unwrap().get("pageSize").is_none());

    crud.state_mut().pagination.current_page = 2;
    let second = crud.to_query(None).await.unwrap().unwrap();
    assert_eq!(ids(&second), (10..20).collect::<Vec<_>>());
    assert_eq!(transport.count(), 1);

    let last = crud.to_page(3).await.unwrap().unwrap();
    assert_eq!(ids(&last), (20..25).collect::<Vec<_>>());
    assert_eq!(transport.count(), 1);

    let reset = crud.reset().await.unwrap().unwrap();
    assert_eq!(ids(&reset), (0..10).collect::<Vec<_>>());
    assert_eq!(crud.state().pagination.current_page, 1);
    assert_eq!(transport.count(), 2);
}

#[tokio::test]
async fn test_cache_flag_pages_like_frontend() {
    let transport = MockTransport::replying(rows(12));
    let context = CrudContext::builder(transport.clone())
        .storage(Arc::new(MemoryStorage::new()))
        .defaults(CrudDefaults::new().cache(true))
        .build();
    let mut crud = Crud::open(context, CrudOptions::new("/users").page_size(5))
        .await
        .unwrap();

    crud.to_query(None).await.unwrap();
    let second = crud.to_page(2).await.unwrap().unwrap();

    assert_eq!(ids(&second), (5..10).collect::<Vec<_>>());
    assert_eq!(transport.count(), 1);
    assert!(!crud.state().pagination.frontend);
    assert!(crud.state().pagination.client_side());
}

#[tokio::test]
async fn test_before_cache_transforms_cached_rows() {
    let transport = MockTransport::replying(json!({"rows": rows(12)}));
    let options = CrudOptions::new("/users").frontend(true).page_size(5);
    let mut crud = open(transport.clone(), options).await;
    crud.on(HookName::BEFORE_CACHE, hook_fn(|ctx| {
        ctx.payload = ctx.payload["rows"].clone();
        Ok(())
    }))
    .unwrap();

    let page = crud.to_query(None).await.unwrap().unwrap();
    assert_eq!(ids(&page), vec![0, 1, 2, 3, 4]);
    assert_eq!(crud.state().pagination.total, 12);

    crud.reload().await.unwrap();
    assert_eq!(transport.count(), 1);
}

#[tokio::test]
async fn test_hooks_run_default_first_then_instance_in_order() {
    let transport = MockTransport::replying(json!([]));
    let mut crud = open(transport, CrudOptions::new("/users")).await;
    let order = Arc::new(Mutex::new(Vec::new()));

    let seen = order.clone();
    crud.context()
        .hooks()
        .set_default(
            HookName::BEFORE_QUERY,
            hook_fn(move |_| {
                seen.lock().unwrap().push("default");
                Ok(())
            }),
        )
        .unwrap();
    for name in ["a", "b"] {
        let seen = order.clone();
        crud.on(HookName::BEFORE_QUERY, hook_fn(move |_| {
            seen.lock().unwrap().push(name);
            Ok(())
        }))
        .unwrap();
    }

    crud.to_query(None).await.unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["default", "a", "b"]);
}

#[tokio::test]
async fn test_transport_failure_fills_error_bundle_and_rethrows() {
    let transport = MockTransport::failing(
        TransportError::new("request failed")
            .with_code("ERR_BAD_RESPONSE")
            .with_response(503, "Service Unavailable"),
    );
    let mut crud = open(transport, CrudOptions::new("/users")).await;
    let reported = Arc::new(Mutex::new(None));
    let sink = reported.clone();
    crud.on(HookName::ON_ERROR, hook_fn(move |ctx| {
        *sink.lock().unwrap() = ctx.error().map(CrudError::name);
        Ok(())
    }))
    .unwrap();

    let err = crud.to_query(None).await.unwrap_err();

    assert!(matches!(err, CrudError::Transport(_)));
    let state = crud.state();
    assert_eq!(state.error.name, "ERR_BAD_RESPONSE");
    assert_eq!(state.error.message, "Service Unavailable");
    assert_eq!(state.error.status, "503");
    assert!(!state.loading.any());
    assert_eq!(reported.lock().unwrap().as_deref(), Some("ERR_BAD_RESPONSE"));
}

#[tokio::test]
async fn test_failing_after_hook_clears_loading_and_runs_error_hook() {
    let transport = MockTransport::replying(json!([]));
    let mut crud = open(transport, CrudOptions::new("/users").row_key("id")).await;
    crud.on(HookName::AFTER_DELETE, hook_fn(|_| {
        Err(CrudError::hook("CRUD_AFTER_DELETE", "boom"))
    }))
    .unwrap();
    crud.on(HookName::ON_ERROR, hook_fn(|_| {
        Err(CrudError::hook("CRUD_ON_ERROR", "error handler failures are swallowed"))
    }))
    .unwrap();

    let err = crud.to_delete(&[json!({"id": 1})]).await.unwrap_err();

    assert!(matches!(err, CrudError::Hook { .. }));
    assert_eq!(crud.state().error.name, "HookError");
    assert!(!crud.state().loading.del);
    assert!(!crud.state().loading.table);
}

#[tokio::test]
async fn test_delete_sends_row_key_values() {
    let transport = MockTransport::replying(json!({"deleted": 2}));
    let mut crud = open(transport.clone(), CrudOptions::new("/users").row_key("uid")).await;

    crud.to_delete(&[json!({"uid": 7}), json!({"uid": "x9"})])
        .await
        .unwrap();

    let request = transport.last();
    assert_eq!(request.method, Method::DELETE);
    assert_eq!(request.data, Some(RequestBody::Json(json!([7, "x9"]))));
}

#[tokio::test]
async fn test_edit_fetches_details_and_recovers_into_form() {
    let transport = MockTransport::new(|request| {
        assert_eq!(request.url, "/users/5");
        Ok(json!({"id": 5, "name": "Ada"}))
    });
    let mut crud = open(transport.clone(), CrudOptions::new("/users").row_key("id")).await;
    crud.on(HookName::BEFORE_EDIT, hook_fn(|ctx| {
        ctx.state.form = ctx.payload.clone();
        Ok(())
    }))
    .unwrap();

    let loaded = crud.to_update(&json!({"id": 5})).await.unwrap();

    assert_eq!(loaded, Some(json!({"id": 5, "name": "Ada"})));
    assert_eq!(crud.state().form_status, FormStatus::Updating);
    assert_eq!(crud.state().editing_id.as_deref(), Some("5"));
    assert_eq!(crud.state().form["name"], json!("Ada"));
    let params = transport.last().params.unwrap();
    assert_eq!(params["id"], json!("5"));
    assert!(!crud.state().loading.form);
}

#[tokio::test]
async fn test_skipped_detail_fetch_still_enters_mode() {
    let transport = MockTransport::replying(json!({}));
    let mut crud = open(transport.clone(), CrudOptions::new("/users").row_key("id")).await;
    crud.on(HookName::BEFORE_EDIT_QUERY, hook_fn(|ctx| {
        ctx.skip_fetch();
        Ok(())
    }))
    .unwrap();

    let loaded = crud.to_update(&json!({"id": 9, "name": "row"})).await.unwrap();

    assert_eq!(loaded, Some(json!({"id": 9, "name": "row"})));
    assert_eq!(crud.state().form_status, FormStatus::Updating);
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn test_submit_posts_form_and_fires_after_submit() {
    let transport = MockTransport::replying(json!({"id": 11}));
    let mut crud = open(transport.clone(), CrudOptions::new("/users")).await;
    let responses = Arc::new(Mutex::new(Vec::new()));
    let sink = responses.clone();
    crud.on(HookName::AFTER_SUBMIT, hook_fn(move |ctx| {
        sink.lock().unwrap().push(ctx.payload.clone());
        Ok(())
    }))
    .unwrap();

    crud.to_add(Value::Null).await.unwrap();
    crud.state_mut().form = json!({"name": "Grace"});
    let response = crud.submit().await.unwrap();

    assert_eq!(response, Some(json!({"id": 11})));
    let request = transport.last();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.data, Some(RequestBody::Json(json!({"name": "Grace"}))));
    assert_eq!(*responses.lock().unwrap(), vec![json!({"id": 11})]);
    // Submitting does not leave the form mode by itself.
    assert_eq!(crud.state().form_status, FormStatus::Adding);
    assert!(!crud.state().loading.submit);
}

#[tokio::test]
async fn test_validation_failure_blocks_submit() {
    let transport = MockTransport::replying(json!({}));
    let options = CrudOptions::new("/users").validator(Arc::new(RequiredFields::new(["name"])));
    let mut crud = open(transport.clone(), options).await;

    crud.to_add(Value::Null).await.unwrap();
    let err = crud.submit().await.unwrap_err();

    assert!(matches!(err, CrudError::Validation(_)));
    assert_eq!(crud.state().error.name, "ValidationError");
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn test_export_requests_blob_and_import_builds_multipart() {
    let transport = MockTransport::replying(json!("ok"));
    let mut crud = open(transport.clone(), CrudOptions::new("/users")).await;
    crud.on(HookName::BEFORE_IMPORT, hook_fn(|ctx| {
        ctx.params.insert("overwrite".into(), json!(true));
        Ok(())
    }))
    .unwrap();

    crud.to_export().await.unwrap();
    let export = transport.last();
    assert_eq!(export.url, "/users/export");
    assert_eq!(export.response_type, Some(ResponseType::Blob));

    crud.to_import(vec![UploadFile::new("a.csv", b"id\n1".to_vec())])
        .await
        .unwrap();
    let Some(RequestBody::Multipart(single)) = transport.last().data else {
        panic!("expected multipart body");
    };
    assert_eq!(single.files[0].0, "file");
    assert_eq!(single.fields, vec![("overwrite".to_string(), "true".to_string())]);

    crud.to_import(vec![
        UploadFile::new("a.csv", b"1".to_vec()),
        UploadFile::new("b.csv", b"2".to_vec()),
    ])
    .await
    .unwrap();
    let Some(RequestBody::Multipart(several)) = transport.last().data else {
        panic!("expected multipart body");
    };
    assert!(several.files.iter().all(|(field, _)| field == "files"));
    assert_eq!(several.files.len(), 2);
}

#[tokio::test]
async fn test_url_tokens_resolve_from_url_params() {
    let transport = MockTransport::replying(json!([]));
    let options = CrudOptions::new("/orgs/:org/users").url_param("org", 7);
    let mut crud = open(transport.clone(), options).await;

    crud.to_query(None).await.unwrap();
    assert_eq!(transport.last().url, "/orgs/7/users");

    let mut params = Map::new();
    params.insert("org".into(), json!("acme"));
    crud.set_url_params(params);
    crud.to_query(None).await.unwrap();
    assert_eq!(transport.last().url, "/orgs/acme/users");
}

#[tokio::test]
async fn test_change_sort_updates_orders_and_requeries() {
    let transport = MockTransport::replying(json!([]));
    let mut crud = open(transport.clone(), CrudOptions::new("/users")).await;
    let orders = Arc::new(Mutex::new(Value::Null));
    let sink = orders.clone();
    crud.on(HookName::BEFORE_QUERY, hook_fn(move |ctx| {
        *sink.lock().unwrap() = ctx.payload.clone();
        Ok(())
    }))
    .unwrap();

    crud.change_sort("name", Some(true)).await.unwrap();
    crud.change_sort("age", Some(false)).await.unwrap();
    crud.change_sort("name", None).await.unwrap();

    assert_eq!(transport.count(), 3);
    assert_eq!(
        *orders.lock().unwrap(),
        json!([{"column": "age", "asc": false}])
    );
}

#[tokio::test]
async fn test_sort_sends_sortation_through_before_sort() {
    let transport = MockTransport::replying(json!({"ok": true}));
    let mut crud = open(transport.clone(), CrudOptions::new("/users")).await;
    crud.state_mut().sortation = json!([{"id": 2, "sort": 1}, {"id": 1, "sort": 2}]);
    crud.on(HookName::BEFORE_SORT, hook_fn(|ctx| {
        if let Some(items) = ctx.payload.as_array_mut() {
            items.truncate(1);
        }
        Ok(())
    }))
    .unwrap();

    let response = crud.to_sort().await.unwrap();

    assert_eq!(response, Some(json!({"ok": true})));
    let request = transport.last();
    assert_eq!(request.url, "/users/sort");
    assert_eq!(request.method, Method::PUT);
    assert_eq!(
        request.data,
        Some(RequestBody::Json(json!([{"id": 2, "sort": 1}])))
    );
    assert!(!crud.state().loading.sort);
}

#[tokio::test]
async fn test_endpoint_overrides_layer_defaults_under_instance() {
    let transport = MockTransport::replying(json!({"ok": true}));
    let defaults =
        CrudDefaults::from_json(r#"{"restApi": {"export": "/download", "Delete": "/batch"}}"#)
            .unwrap();
    let context = CrudContext::builder(transport.clone())
        .storage(Arc::new(MemoryStorage::new()))
        .defaults(defaults)
        .build();
    let options = CrudOptions::new("/users")
        .row_key("id")
        .rest_api(Operation::Delete, EndpointSpec::method(Method::POST));
    let mut crud = Crud::open(context, options).await.unwrap();

    crud.to_delete(&[json!({"id": 1})]).await.unwrap();
    let request = transport.last();
    assert_eq!(request.url, "/users/batch");
    assert_eq!(request.method, Method::POST);

    crud.to_export().await.unwrap();
    let request = transport.last();
    assert_eq!(request.url, "/users/download");
    assert_eq!(request.method, Method::GET);
}

#[tokio::test]
async fn test_custom_endpoint_runs_its_own_hooks() {
    let transport = MockTransport::replying(json!({"published": true}));
    let mut crud = open(transport.clone(), CrudOptions::new("/posts")).await;
    crud.register_endpoint("publish", CustomEndpoint::new("/publish", Method::POST))
        .unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    for hook in [HookName::before("publish"), HookName::after("publish")] {
        let sink = seen.clone();
        crud.on(hook, hook_fn(move |ctx| {
            sink.lock().unwrap().push(ctx.hook().to_string());
            Ok(())
        }))
        .unwrap();
    }

    let response = crud
        .invoke_endpoint("publish", Map::new(), Some(json!({"id": 1})))
        .await
        .unwrap();

    assert_eq!(response, Some(json!({"published": true})));
    assert_eq!(transport.last().url, "/posts/publish");
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["CRUD_BEFORE_PUBLISH", "CRUD_AFTER_PUBLISH"]
    );
    assert_eq!(crud.state().loading.custom.get("publish"), Some(&false));

    assert!(matches!(
        crud.invoke_endpoint("missing", Map::new(), None).await,
        Err(CrudError::Config(_))
    ));
    assert!(crud
        .register_endpoint("query", CustomEndpoint::new("/q", Method::GET))
        .is_err());
}

#[tokio::test]
async fn test_empty_url_is_rejected() {
    let transport = MockTransport::replying(Value::Null);
    let err = Crud::open(context_with(transport), CrudOptions::new("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::Config(_)));
}

#[tokio::test]
async fn test_drafts_survive_instances_until_cancelled() {
    let transport = MockTransport::replying(json!({}));
    let context = context_with(transport);
    let options = CrudOptions::new("/users").recoverable(true);

    let mut first = Crud::open(context.clone(), options.clone()).await.unwrap();
    first.to_add(Value::Null).await.unwrap();
    first.state_mut().form = json!({"name": "unsaved"});
    assert!(first.snapshot_form().await.unwrap());

    let mut second = Crud::open(context.clone(), options.clone()).await.unwrap();
    assert_eq!(second.recoverable_drafts().count(), 1);
    let offered = Arc::new(Mutex::new(Value::Null));
    let sink = offered.clone();
    second
        .on(HookName::BEFORE_RECOVER, hook_fn(move |ctx| {
            *sink.lock().unwrap() = ctx.payload.clone();
            Ok(())
        }))
        .unwrap();
    second.to_add(Value::Null).await.unwrap();

    assert_eq!(*offered.lock().unwrap(), json!({"name": "unsaved"}));
    assert_eq!(second.state().form["name"], json!("unsaved"));

    second.cancel().await.unwrap();
    assert_eq!(second.state().form_status, FormStatus::Idle);

    let third = Crud::open(context, options).await.unwrap();
    assert_eq!(third.recoverable_drafts().count(), 0);
}

#[tokio::test]
async fn test_edit_draft_rehydrates_from_file_until_submitted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drafts.json");
    let transport = MockTransport::new(|request| {
        if request.method == Method::GET {
            Ok(json!({"id": 5, "name": "server", "email": "a@example.com"}))
        } else {
            Ok(json!({"ok": true}))
        }
    });
    let options = CrudOptions::new("/users").row_key("id").recoverable(true);
    let form_from_details = || {
        hook_fn(|ctx| {
            ctx.state.form = ctx.payload.clone();
            Ok(())
        })
    };

    let mut first = Crud::open(file_context(transport.clone(), &path), options.clone())
        .await
        .unwrap();
    first.on(HookName::BEFORE_EDIT, form_from_details()).unwrap();
    first.to_update(&json!({"id": 5})).await.unwrap();
    first.state_mut().form["name"] = json!("draft");
    assert!(first.snapshot_form().await.unwrap());
    drop(first);

    let mut second = Crud::open(file_context(transport.clone(), &path), options.clone())
        .await
        .unwrap();
    let slots: Vec<SnapshotSlot> = second.recoverable_drafts().cloned().collect();
    assert_eq!(slots, vec![SnapshotSlot::new(FormStatus::Updating, Some("5"))]);
    second.on(HookName::BEFORE_EDIT, form_from_details()).unwrap();

    second.to_update(&json!({"id": 5})).await.unwrap();

    assert_eq!(transport.last().url, "/users/5");
    assert_eq!(second.state().editing_id.as_deref(), Some("5"));
    assert_eq!(second.state().form["name"], json!("draft"));
    assert_eq!(second.state().form["email"], json!("a@example.com"));

    second.submit().await.unwrap();
    let request = transport.last();
    assert_eq!(request.method, Method::PUT);
    assert_eq!(
        request.data,
        Some(RequestBody::Json(
            json!({"id": 5, "name": "draft", "email": "a@example.com"})
        ))
    );

    let third = Crud::open(file_context(transport, &path), options)
        .await
        .unwrap();
    assert_eq!(third.recoverable_drafts().count(), 0);
}

#[tokio::test]
async fn test_cancelled_recovery_keeps_form() {
    let transport = MockTransport::replying(json!({}));
    let context = context_with(transport);
    let options = CrudOptions::new("/users").recoverable(true);

    let mut first = Crud::open(context.clone(), options.clone()).await.unwrap();
    first.to_add(Value::Null).await.unwrap();
    first.state_mut().form = json!({"name": "unsaved"});
    first.snapshot_form().await.unwrap();

    let mut second = Crud::open(context, options).await.unwrap();
    second
        .on(HookName::BEFORE_RECOVER, hook_fn(|ctx| {
            ctx.cancel();
            Ok(())
        }))
        .unwrap();
    second.to_add(Value::Null).await.unwrap();

    assert_eq!(second.state().form, json!({}));
}

#[tokio::test]
async fn test_cancel_fires_on_cancel_after_leaving_mode() {
    let transport = MockTransport::replying(json!({}));
    let mut crud = open(transport, CrudOptions::new("/users")).await;
    let status = Arc::new(Mutex::new(None));
    let sink = status.clone();
    crud.on(HookName::ON_CANCEL, hook_fn(move |ctx| {
        *sink.lock().unwrap() = Some(ctx.state.form_status);
        Ok(())
    }))
    .unwrap();

    crud.to_add(Value::Null).await.unwrap();
    crud.cancel().await.unwrap();

    assert_eq!(*status.lock().unwrap(), Some(FormStatus::Idle));
}

#[tokio::test]
async fn test_async_handlers_are_awaited_in_sequence() {
    use async_trait::async_trait;
    use restcrud::{HookContext, HookHandler};

    struct Slow(Arc<Mutex<Vec<&'static str>>>, &'static str, u64);

    #[async_trait]
    impl HookHandler for Slow {
        async fn call(&self, _ctx: &mut HookContext<'_>) -> restcrud::Result<()> {
            tokio::time::sleep(Duration::from_millis(self.2)).await;
            self.0.lock().unwrap().push(self.1);
            Ok(())
        }
    }

    let transport = MockTransport::replying(json!([]));
    let mut crud = open(transport, CrudOptions::new("/users")).await;
    let order = Arc::new(Mutex::new(Vec::new()));
    crud.on(HookName::AFTER_QUERY, Arc::new(Slow(order.clone(), "slow", 30)))
        .unwrap();
    crud.on(HookName::AFTER_QUERY, Arc::new(Slow(order.clone(), "fast", 1)))
        .unwrap();

    crud.to_query(None).await.unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["slow", "fast"]);
}
