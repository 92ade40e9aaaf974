//! Typed facade over the command table.
//!
//! Resource types are chosen by the caller (`T: DeserializeOwned`); the
//! facade fixes only the arguments, the options type, and whether the result
//! is a value, an optional value, a collection, or nothing.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{CommandClient, PendingCall};
use crate::commands;
use crate::config::ClientConfig;
use crate::error::ApiResult;
use crate::job::{JobComplete, JobStatusSource, RetryPolicy};
use crate::options::{DeleteIsoOptions, DeployVirtualMachineOptions, ListOptions, QueryOptions, UpdateIsoPermissionsOptions};
use crate::types::{AsyncCreateResponse, AsyncJob};

#[derive(Debug, Clone)]
pub struct CloudStackApi {
    client: CommandClient,
}

impl CloudStackApi {
    pub fn new(config: &ClientConfig) -> Self {
        Self::from_client(CommandClient::new(config))
    }

    pub fn from_client(client: CommandClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &CommandClient {
        &self.client
    }

    pub fn list_zones<T: DeserializeOwned>(&self, options: ListOptions) -> ApiResult<Vec<T>> {
        let options = QueryOptions::from(options);
        Ok(self.client.invoke(&commands::LIST_ZONES, &[], Some(&options))?.into_set()?)
    }

    pub fn list_virtual_machines<T: DeserializeOwned>(&self, options: ListOptions) -> ApiResult<Vec<T>> {
        let options = QueryOptions::from(options);
        Ok(self
            .client
            .invoke(&commands::LIST_VIRTUAL_MACHINES, &[], Some(&options))?
            .into_set()?)
    }

    /// `None` when no virtual machine has this id.
    pub fn get_virtual_machine<T: DeserializeOwned>(&self, id: &str) -> ApiResult<Option<T>> {
        Ok(self
            .client
            .invoke(&commands::GET_VIRTUAL_MACHINE, &[Some(id)], None)?
            .into_option()?)
    }

    pub fn deploy_virtual_machine(
        &self,
        zone_id: &str,
        service_offering_id: &str,
        template_id: &str,
        options: DeployVirtualMachineOptions,
    ) -> ApiResult<AsyncCreateResponse> {
        let options = QueryOptions::from(options);
        Ok(self
            .client
            .invoke(
                &commands::DEPLOY_VIRTUAL_MACHINE,
                &[Some(zone_id), Some(service_offering_id), Some(template_id)],
                Some(&options),
            )?
            .into_value()?)
    }

    /// `None` when the virtual machine does not exist.
    pub fn destroy_virtual_machine(&self, id: &str) -> ApiResult<Option<AsyncCreateResponse>> {
        Ok(self
            .client
            .invoke(&commands::DESTROY_VIRTUAL_MACHINE, &[Some(id)], None)?
            .into_option()?)
    }

    pub fn reboot_virtual_machine(&self, id: &str) -> ApiResult<AsyncCreateResponse> {
        Ok(self
            .client
            .invoke(&commands::REBOOT_VIRTUAL_MACHINE, &[Some(id)], None)?
            .into_value()?)
    }

    pub fn query_async_job_result(&self, jobid: &str) -> ApiResult<Option<AsyncJob>> {
        self.client.job(jobid)
    }

    pub fn list_async_jobs(&self, options: ListOptions) -> ApiResult<Vec<AsyncJob>> {
        let options = QueryOptions::from(options);
        Ok(self
            .client
            .invoke(&commands::LIST_ASYNC_JOBS, &[], Some(&options))?
            .into_set()?)
    }

    pub fn list_firewall_rules<T: DeserializeOwned>(&self) -> ApiResult<Vec<T>> {
        Ok(self
            .client
            .invoke(&commands::LIST_FIREWALL_RULES, &[], None)?
            .into_set()?)
    }

    pub fn update_iso_permissions(&self, id: &str, options: UpdateIsoPermissionsOptions) -> ApiResult<()> {
        let options = QueryOptions::from(options);
        self.client
            .invoke(&commands::UPDATE_ISO_PERMISSIONS, &[Some(id)], Some(&options))?
            .into_void();
        Ok(())
    }

    /// Deleting an ISO that is already gone succeeds.
    pub fn delete_iso(&self, id: &str, options: DeleteIsoOptions) -> ApiResult<()> {
        let options = QueryOptions::from(options);
        self.client
            .invoke(&commands::DELETE_ISO, &[Some(id)], Some(&options))?
            .into_void();
        Ok(())
    }

    pub fn list_capabilities(&self) -> ApiResult<Value> {
        Ok(self
            .client
            .invoke(&commands::LIST_CAPABILITIES, &[], None)?
            .into_value()?)
    }

    pub fn list_zones_async<T>(&self, options: ListOptions) -> ApiResult<PendingCall<Vec<T>>>
    where
        T: DeserializeOwned + 'static,
    {
        let options = QueryOptions::from(options);
        self.client
            .submit_with(&commands::LIST_ZONES, &[], Some(&options), |payload| Ok(payload.into_set::<T>()?))
    }

    pub fn get_virtual_machine_async<T>(&self, id: &str) -> ApiResult<PendingCall<Option<T>>>
    where
        T: DeserializeOwned + 'static,
    {
        self.client
            .submit_with(&commands::GET_VIRTUAL_MACHINE, &[Some(id)], None, |payload| {
                Ok(payload.into_option::<T>()?)
            })
    }

    pub fn deploy_virtual_machine_async(
        &self,
        zone_id: &str,
        service_offering_id: &str,
        template_id: &str,
        options: DeployVirtualMachineOptions,
    ) -> ApiResult<PendingCall<AsyncCreateResponse>> {
        let options = QueryOptions::from(options);
        self.client.submit_with(
            &commands::DEPLOY_VIRTUAL_MACHINE,
            &[Some(zone_id), Some(service_offering_id), Some(template_id)],
            Some(&options),
            |payload| Ok(payload.into_value::<AsyncCreateResponse>()?),
        )
    }

    /// Job predicate polling through this client.
    pub fn job_complete(&self, policy: RetryPolicy) -> JobComplete<&CommandClient> {
        JobComplete::new(&self.client, policy)
    }
}

impl JobStatusSource for CloudStackApi {
    fn job(&self, jobid: &str) -> ApiResult<Option<AsyncJob>> {
        self.client.job(jobid)
    }
}
