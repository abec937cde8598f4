use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};

use super::{check, BackendClient, BackendError};

const FUNCTIONS_PREFIX: &str = "functions/v1";

impl BackendClient {
    /// Invokes a named serverless function with a JSON body
    #[tracing::instrument(skip(self, token, body))]
    pub async fn invoke<B: Serialize, T: DeserializeOwned>(
        &self,
        token: &str,
        function: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .request(
                Method::POST,
                &format!("{}/{}", FUNCTIONS_PREFIX, function),
                token,
            )
            .json(body)
            .send()
            .await?;

        let result = check(response).await?.json().await?;
        Ok(result)
    }
}
