#![allow(dead_code)]

use async_trait::async_trait;
use restcrud::crud::Request;
use restcrud::{
    Crud, CrudContext, CrudOptions, FileStorage, MemoryStorage, Transport, TransportError,
};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&Request) -> Result<Value, TransportError> + Send + Sync;

/// Transport double: records every request and answers through a closure.
pub struct MockTransport {
    requests: Mutex<Vec<Request>>,
    responder: Box<Responder>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&Request) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    pub fn replying(response: Value) -> Arc<Self> {
        Self::new(move |_| Ok(response.clone()))
    }

    pub fn failing(error: TransportError) -> Arc<Self> {
        Self::new(move |_| Err(error.clone()))
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last(&self) -> Request {
        self.requests.lock().unwrap().last().cloned().expect("no request sent")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: Request) -> Result<Value, TransportError> {
        let response = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }
}

pub fn context_with(transport: Arc<MockTransport>) -> Arc<CrudContext> {
    CrudContext::builder(transport)
        .storage(Arc::new(MemoryStorage::new()))
        .origin("/admin/users")
        .build()
}

/// Context persisting drafts to a JSON file; a fresh one per call mimics a restart.
pub fn file_context(transport: Arc<MockTransport>, path: &Path) -> Arc<CrudContext> {
    CrudContext::builder(transport)
        .storage(Arc::new(FileStorage::new(path)))
        .origin("/admin/users")
        .build()
}

pub async fn open(transport: Arc<MockTransport>, options: CrudOptions) -> Crud {
    Crud::open(context_with(transport), options).await.unwrap()
}
