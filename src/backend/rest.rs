use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};

use super::{check, BackendClient, BackendError};

const REST_PREFIX: &str = "rest/v1";

/// Row selection for the REST store: columns, equality filters, ordering and limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.split_whitespace().collect::<Vec<_>>().join(""));
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order = Some(format!("{}.{}", column, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters.clone()
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "select".to_string(),
            self.select.clone().unwrap_or_else(|| "*".to_string()),
        )];
        params.extend(self.filters.iter().cloned());
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

fn table_path(table: &str) -> String {
    format!("{}/{}", REST_PREFIX, table)
}

impl BackendClient {
    /// Reads rows from a table or view
    #[tracing::instrument(skip(self, token, query))]
    pub async fn select<T: DeserializeOwned>(
        &self,
        token: &str,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, BackendError> {
        let response = self
            .request(Method::GET, &table_path(table), token)
            .query(&query.to_params())
            .send()
            .await?;

        let rows = check(response).await?.json().await?;
        Ok(rows)
    }

    /// Inserts rows and returns them as stored
    #[tracing::instrument(skip(self, token, rows), fields(count = rows.len()))]
    pub async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        token: &str,
        table: &str,
        rows: &[B],
    ) -> Result<Vec<T>, BackendError> {
        let response = self
            .request(Method::POST, &table_path(table), token)
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await?;

        let stored = check(response).await?.json().await?;
        Ok(stored)
    }

    /// Patches every row matching `filter` and returns the updated rows
    #[tracing::instrument(skip(self, token, filter, patch))]
    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        token: &str,
        table: &str,
        filter: &Query,
        patch: &B,
    ) -> Result<Vec<T>, BackendError> {
        if !filter.has_filters() {
            return Err(BackendError::MissingFilter("update"));
        }

        let response = self
            .request(Method::PATCH, &table_path(table), token)
            .header("Prefer", "return=representation")
            .query(&filter.to_params())
            .json(patch)
            .send()
            .await?;

        let updated = check(response).await?.json().await?;
        Ok(updated)
    }

    #[tracing::instrument(skip(self, token, filter))]
    pub async fn delete(&self, token: &str, table: &str, filter: &Query) -> Result<(), BackendError> {
        if !filter.has_filters() {
            return Err(BackendError::MissingFilter("delete"));
        }

        let response = self
            .request(Method::DELETE, &table_path(table), token)
            .query(&filter.filter_params())
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    /// Inserts rows, merging into existing ones that collide on `on_conflict`
    #[tracing::instrument(skip(self, token, rows), fields(count = rows.len()))]
    pub async fn upsert<B: Serialize>(
        &self,
        token: &str,
        table: &str,
        rows: &[B],
        on_conflict: &str,
    ) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, &table_path(table), token)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .query(&[("on_conflict", on_conflict)])
            .json(rows)
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, headers, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, Serialize)]
    struct Row {
        id: i64,
        nome: String,
    }

    fn client(server: &MockServer) -> BackendClient {
        BackendClient::new(&server.uri(), Secret::new("anon".to_string()))
    }

    #[test]
    fn test_query_params() {
        let query = Query::new()
            .select("id, nome, cargo")
            .eq("id", 7)
            .order("nome", true)
            .limit(10);

        assert_eq!(
            query.to_params(),
            vec![
                ("select".to_string(), "id,nome,cargo".to_string()),
                ("id".to_string(), "eq.7".to_string()),
                ("order".to_string(), "nome.asc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
        assert_eq!(Query::new().to_params()[0].1, "*");
    }

    #[tokio::test]
    async fn test_select_sends_key_token_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/integrantes"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer user-token"))
            .and(query_param("select", "id,nome"))
            .and(query_param("order", "nome.asc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "id": 1, "nome": "Ana Silva" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let rows: Vec<Row> = client(&server)
            .select(
                "user-token",
                "integrantes",
                &Query::new().select("id,nome").order("nome", true),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].nome, "Ana Silva");
    }

    #[tokio::test]
    async fn test_upsert_uses_conflict_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/integrantes"))
            .and(query_param("on_conflict", "cpf"))
            .and(headers(
                "prefer",
                vec!["resolution=merge-duplicates", "return=minimal"],
            ))
            .and(body_json(json!([{ "id": 1, "nome": "Ana" }])))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .upsert(
                "token",
                "integrantes",
                &[Row {
                    id: 1,
                    nome: "Ana".to_string(),
                }],
                "cpf",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized_and_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/usuarios"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/convocacoes"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "message": "column convocacoes.foo does not exist" })),
            )
            .mount(&server)
            .await;

        let client = client(&server);

        let err = client
            .select::<Row>("token", "usuarios", &Query::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized));

        let err = client
            .select::<Row>("token", "convocacoes", &Query::new())
            .await
            .unwrap_err();
        match err {
            BackendError::ApiError { status, message } => {
                assert_eq!(status.as_u16(), 400);
                assert_eq!(message, "column convocacoes.foo does not exist");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_requires_filter() {
        let server = MockServer::start().await;
        let err = client(&server)
            .delete("token", "integrantes", &Query::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::MissingFilter("delete")));
    }
}
