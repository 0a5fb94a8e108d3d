use super::{Crud, LoadingFlag, Operation};
use crate::core::{Result, layered};
use crate::hooks::HookName;
use log::warn;
use serde_json::{Map, Value};
use tracing::{Instrument, Level, event, info_span};

const QUERY_FLAGS: &[LoadingFlag] = &[LoadingFlag::Query, LoadingFlag::Table];

impl Crud {
    /// Request parameters of a query or export.
    ///
    /// Precedence: global defaults < instance defaults < `state.query` < `overrides`,
    /// then pagination fields unless results are paged on the client.
    pub(crate) fn query_params(&self, overrides: Option<&Map<String, Value>>) -> Map<String, Value> {
        let empty = Map::new();
        let mut params = layered(&[
            &self.context.defaults().query,
            &self.default_query,
            &self.state.query,
            overrides.unwrap_or(&empty),
        ]);
        if !self.state.pagination.client_side() {
            params.insert(
                "currentPage".to_string(),
                Value::from(self.state.pagination.current_page),
            );
            params.insert("pageSize".to_string(), Value::from(self.effective_page_size()));
        }
        params
    }

    pub(crate) fn orders_payload(&self) -> Value {
        serde_json::to_value(&self.state.table.orders).unwrap_or(Value::Null)
    }

    /// Runs the query pipeline and returns the (page of the) result.
    ///
    /// With client-side paging the full result is fetched once and cached;
    /// later calls slice the cache without a transport call.
    pub async fn to_query(&mut self, overrides: Option<Map<String, Value>>) -> Result<Option<Value>> {
        let span = info_span!("crud.query", instance = %self.id);
        self.query_inner(overrides).instrument(span).await
    }

    async fn query_inner(&mut self, overrides: Option<Map<String, Value>>) -> Result<Option<Value>> {
        let params = self.query_params(overrides.as_ref());
        let orders = self.orders_payload();
        let Some(outcome) = self.gate(HookName::BEFORE_QUERY, params, orders).await? else {
            return Ok(None);
        };

        if !self.state.pagination.client_side() {
            let request = self.request(Operation::Query).params(outcome.params);
            let response = self
                .execute(request, QUERY_FLAGS, HookName::AFTER_QUERY, |_| None)
                .await?;
            return Ok(Some(response));
        }

        let rows = match self.cache.clone() {
            Some(cached) => cached,
            None => self.fill_cache(outcome.params).await?,
        };
        let page = self.slice_page(&rows);
        if let Err(err) = self
            .finish_with(HookName::AFTER_QUERY, page.clone(), None)
            .await
        {
            return Err(self.fail(err, QUERY_FLAGS).await);
        }
        Ok(Some(page))
    }

    /// Fetches the full result and offers it to BEFORE_CACHE.
    ///
    /// A cancelled BEFORE_CACHE serves the response for this call only.
    async fn fill_cache(&mut self, params: Map<String, Value>) -> Result<Value> {
        let request = self.request(Operation::Query).params(params);
        let response = self.send(request, QUERY_FLAGS).await?;
        let outcome = match self
            .fire(HookName::BEFORE_CACHE, Map::new(), response)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.fail(err, QUERY_FLAGS).await),
        };
        if outcome.proceed {
            self.cache = Some(outcome.payload.clone());
            event!(Level::DEBUG, instance = %self.id, "query result cached");
        }
        Ok(outcome.payload)
    }

    /// Slices `(page-1)*size .. page*size` out of a cached array and updates the total.
    fn slice_page(&mut self, rows: &Value) -> Value {
        let Some(rows) = rows.as_array() else {
            warn!("[CRUD] - cached query result is not an array, paging skipped - to_query()");
            return rows.clone();
        };
        let size = self.effective_page_size();
        let page = self.state.pagination.current_page.max(1);
        let start = (page - 1).saturating_mul(size).min(rows.len());
        let end = start.saturating_add(size).min(rows.len());
        self.state.pagination.total = rows.len();
        Value::Array(rows[start..end].to_vec())
    }

    /// Back to the first page and query again.
    pub async fn reload(&mut self) -> Result<Option<Value>> {
        self.state.pagination.current_page = 1;
        self.to_query(None).await
    }

    /// Drops the client-side cache, then reloads.
    pub async fn reset(&mut self) -> Result<Option<Value>> {
        self.cache = None;
        self.reload().await
    }

    /// Moves to `page` and queries it.
    pub async fn to_page(&mut self, page: usize) -> Result<Option<Value>> {
        self.state.pagination.current_page = page.max(1);
        self.to_query(None).await
    }

    /// Updates the multi-column ordering and re-queries.
    ///
    /// `Some(true)` sorts ascending, `Some(false)` descending, `None` drops the column.
    pub async fn change_sort(&mut self, column: &str, order: Option<bool>) -> Result<Option<Value>> {
        self.state.table.change_sort(column, order);
        self.to_query(None).await
    }
}
