// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Role store backed by the managed database's REST interface.
//
// Reads `GET /rest/v1/{table}?select=role&id=eq.{subject}` with the service
// key. An empty array is "no record"; more than one row, or a row without a
// role, is a malformed record.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use pressed_access::{AccessError, RoleStore, SubjectId};

use crate::provider::{directory_url, transport_error};

#[derive(Debug, Clone)]
pub struct HttpRoleStore {
    client: Client,
    base: Url,
    table: String,
    service_key: String,
}

#[derive(Deserialize)]
struct RoleRow {
    role: Option<String>,
}

impl HttpRoleStore {
    pub fn new(
        client: Client,
        base_url: &str,
        table: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            base: directory_url(base_url)?,
            table: table.into(),
            service_key: service_key.into(),
        })
    }

    fn query_url(&self, subject: &SubjectId) -> Result<Url, AccessError> {
        let mut url = self
            .base
            .join(&format!("rest/v1/{}", self.table))
            .map_err(|e| AccessError::ProviderUnreachable(format!("bad role table url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("select", "role")
            .append_pair("id", &format!("eq.{subject}"));
        Ok(url)
    }
}

#[async_trait]
impl RoleStore for HttpRoleStore {
    async fn fetch_role(&self, subject: &SubjectId) -> Result<Option<String>, AccessError> {
        let response = self
            .client
            .get(self.query_url(subject)?)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AccessError::ProviderUnreachable(format!(
                "role store answered {status}"
            )));
        }

        let mut rows = response
            .json::<Vec<RoleRow>>()
            .await
            .map_err(|e| AccessError::ProviderUnreachable(format!("undecodable role response: {e}")))?;

        match rows.len() {
            0 => Ok(None),
            1 => match rows.pop().and_then(|row| row.role) {
                Some(role) => Ok(Some(role)),
                None => Err(AccessError::MalformedRoleRecord("role column is null".to_string())),
            },
            n => Err(AccessError::MalformedRoleRecord(format!(
                "{n} role records for one subject"
            ))),
        }
    }

    fn name(&self) -> &str {
        "http-role-store"
    }
}
