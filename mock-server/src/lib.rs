//! In-memory simulator of a CloudStack `/client/api` endpoint.
//!
//! # Design
//! One route dispatches on the `command` query parameter. Requests without
//! `apiKey` and `signature` are rejected with 401; signatures are not
//! verified. Async commands create a job that reports `jobstatus: 0` for
//! `JOB_PENDING_POLLS` polls and applies its effect when it completes.
//! A deploy with template id `FAILING_TEMPLATE` produces a failed job.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Polls a job stays in progress before completing.
pub const JOB_PENDING_POLLS: u32 = 2;

pub const FAILING_TEMPLATE: &str = "failing-template";

pub const ZONE_ID: &str = "1";

pub const SEEDED_ISO_ID: &str = "iso-1";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub displayname: String,
    pub state: String,
    pub zoneid: String,
    pub serviceofferingid: String,
    pub templateid: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Iso {
    pub id: String,
    pub name: String,
    pub ispublic: bool,
    pub isfeatured: bool,
    pub isextractable: bool,
}

#[derive(Clone, Debug, PartialEq)]
enum Effect {
    Deploy,
    Destroy,
    Reboot,
    Fail { code: i64, text: String },
}

#[derive(Clone, Debug)]
struct Job {
    id: String,
    cmd: String,
    vm_id: String,
    effect: Effect,
    polls_left: u32,
    outcome: Option<(i64, Value)>,
}

#[derive(Debug, Default)]
pub struct Cloud {
    vms: HashMap<String, VirtualMachine>,
    isos: HashMap<String, Iso>,
    jobs: HashMap<String, Job>,
    job_order: Vec<String>,
}

impl Cloud {
    fn seeded() -> Self {
        let mut cloud = Cloud::default();
        cloud.isos.insert(
            SEEDED_ISO_ID.to_string(),
            Iso {
                id: SEEDED_ISO_ID.to_string(),
                name: "debian-netinst".to_string(),
                ispublic: false,
                isfeatured: false,
                isextractable: false,
            },
        );
        cloud
    }

    fn start_job(&mut self, cmd: &str, vm_id: &str, effect: Effect) -> String {
        let id = Uuid::new_v4().to_string();
        self.jobs.insert(
            id.clone(),
            Job {
                id: id.clone(),
                cmd: cmd.to_string(),
                vm_id: vm_id.to_string(),
                effect,
                polls_left: JOB_PENDING_POLLS,
                outcome: None,
            },
        );
        self.job_order.push(id.clone());
        id
    }

    /// Advance a job by one poll and return its record.
    fn poll_job(&mut self, jobid: &str) -> Option<Value> {
        let job = self.jobs.get_mut(jobid)?;
        if job.outcome.is_none() {
            if job.polls_left > 0 {
                job.polls_left -= 1;
            } else {
                let job = job.clone();
                let outcome = self.complete(&job);
                if let Some(stored) = self.jobs.get_mut(jobid) {
                    stored.outcome = Some(outcome);
                }
            }
        }
        self.jobs.get(jobid).map(job_record)
    }

    fn complete(&mut self, job: &Job) -> (i64, Value) {
        info!(jobid = %job.id, cmd = %job.cmd, "job completed");
        match &job.effect {
            Effect::Fail { code, text } => {
                self.vms.remove(&job.vm_id);
                (2, json!({"errorcode": code, "errortext": text}))
            }
            Effect::Deploy | Effect::Reboot => {
                let Some(vm) = self.vms.get_mut(&job.vm_id) else {
                    return (2, json!({"errorcode": 530, "errortext": "virtual machine vanished"}));
                };
                vm.state = "Running".to_string();
                (1, json!({"virtualmachine": vm}))
            }
            Effect::Destroy => match self.vms.remove(&job.vm_id) {
                Some(mut vm) => {
                    vm.state = "Destroyed".to_string();
                    (1, json!({"virtualmachine": vm}))
                }
                None => (2, json!({"errorcode": 530, "errortext": "virtual machine vanished"})),
            },
        }
    }
}

fn job_record(job: &Job) -> Value {
    let mut record = json!({
        "jobid": job.id,
        "cmd": job.cmd,
        "jobinstancetype": "VirtualMachine",
        "jobinstanceid": job.vm_id,
    });
    match &job.outcome {
        None => {
            record["jobstatus"] = json!(0);
            record["jobprocstatus"] = json!(JOB_PENDING_POLLS - job.polls_left);
            record["jobresultcode"] = json!(0);
        }
        Some((status, result)) => {
            record["jobstatus"] = json!(status);
            record["jobresultcode"] = json!(if *status == 1 { 0 } else { 530 });
            record["jobresulttype"] = json!("object");
            record["jobresult"] = result.clone();
        }
    }
    record
}

pub type Db = Arc<RwLock<Cloud>>;

type Params = HashMap<String, String>;

type Reply = (StatusCode, Json<Value>);

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Cloud::seeded()));
    Router::new().route("/client/api", get(api)).with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn api(State(db): State<Db>, Query(params): Query<Params>) -> Reply {
    if !params.contains_key("apiKey") || !params.contains_key("signature") {
        return error(StatusCode::UNAUTHORIZED, "unable to verify user credentials and/or request signature");
    }
    let Some(command) = params.get("command").cloned() else {
        return error(StatusCode::BAD_REQUEST, "missing parameter command");
    };
    debug!(%command, "dispatching");

    match command.as_str() {
        "listZones" => list_zones(),
        "listVirtualMachines" => list_virtual_machines(&db, &params).await,
        "deployVirtualMachine" => deploy_virtual_machine(&db, &params).await,
        "destroyVirtualMachine" => vm_job(&db, &params, "destroyVirtualMachine", Effect::Destroy).await,
        "rebootVirtualMachine" => vm_job(&db, &params, "rebootVirtualMachine", Effect::Reboot).await,
        "queryAsyncJobResult" => query_async_job_result(&db, &params).await,
        "listAsyncJobs" => list_async_jobs(&db).await,
        "listFirewallRules" => list_firewall_rules(),
        "updateIsoPermissions" => update_iso_permissions(&db, &params).await,
        "deleteIso" => delete_iso(&db, &params).await,
        "listCapabilities" => list_capabilities(),
        other => error(StatusCode::BAD_REQUEST, &format!("unknown command {other}")),
    }
}

fn envelope(command: &str, inner: Value) -> Reply {
    let mut body = serde_json::Map::new();
    body.insert(format!("{}response", command.to_lowercase()), inner);
    (StatusCode::OK, Json(Value::Object(body)))
}

fn listing(command: &str, collection: &str, items: Vec<Value>) -> Reply {
    if items.is_empty() {
        return envelope(command, json!({}));
    }
    envelope(command, json!({"count": items.len(), collection: items}))
}

fn error(status: StatusCode, text: &str) -> Reply {
    (
        status,
        Json(json!({"errorresponse": {"errorcode": status.as_u16(), "errortext": text}})),
    )
}

fn require<'a>(params: &'a Params, command: &str, name: &str) -> Result<&'a str, Reply> {
    params.get(name).map(String::as_str).ok_or_else(|| {
        error(
            StatusCode::BAD_REQUEST,
            &format!("Unable to execute API command {} due to missing parameter {name}", command.to_lowercase()),
        )
    })
}

fn list_zones() -> Reply {
    listing(
        "listZones",
        "zone",
        vec![json!({"id": ZONE_ID, "name": "zone1", "networktype": "Advanced", "allocationstate": "Enabled"})],
    )
}

async fn list_virtual_machines(db: &Db, params: &Params) -> Reply {
    let cloud = db.read().await;
    let mut vms: Vec<&VirtualMachine> = cloud
        .vms
        .values()
        .filter(|vm| params.get("id").map_or(true, |id| &vm.id == id))
        .filter(|vm| params.get("zoneid").map_or(true, |zone| &vm.zoneid == zone))
        .filter(|vm| params.get("name").map_or(true, |name| &vm.name == name))
        .collect();
    vms.sort_by(|a, b| a.name.cmp(&b.name));
    let items = vms.into_iter().map(|vm| json!(vm)).collect();
    listing("listVirtualMachines", "virtualmachine", items)
}

async fn deploy_virtual_machine(db: &Db, params: &Params) -> Reply {
    const COMMAND: &str = "deployVirtualMachine";
    let (zoneid, offering, template) = match (
        require(params, COMMAND, "zoneid"),
        require(params, COMMAND, "serviceofferingid"),
        require(params, COMMAND, "templateid"),
    ) {
        (Ok(z), Ok(o), Ok(t)) => (z, o, t),
        (Err(reply), _, _) | (_, Err(reply), _) | (_, _, Err(reply)) => return reply,
    };

    let id = Uuid::new_v4().to_string();
    let name = params
        .get("name")
        .cloned()
        .unwrap_or_else(|| format!("VM-{}", &id[..8]));
    let vm = VirtualMachine {
        id: id.clone(),
        displayname: params.get("displayname").cloned().unwrap_or_else(|| name.clone()),
        name,
        state: "Starting".to_string(),
        zoneid: zoneid.to_string(),
        serviceofferingid: offering.to_string(),
        templateid: template.to_string(),
    };

    let effect = if template == FAILING_TEMPLATE {
        Effect::Fail {
            code: 530,
            text: "Insufficient capacity to deploy the virtual machine".to_string(),
        }
    } else {
        Effect::Deploy
    };

    let mut cloud = db.write().await;
    cloud.vms.insert(id.clone(), vm);
    let jobid = cloud.start_job(COMMAND, &id, effect);
    envelope(COMMAND, json!({"id": id, "jobid": jobid}))
}

async fn vm_job(db: &Db, params: &Params, command: &str, effect: Effect) -> Reply {
    let id = match require(params, command, "id") {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let mut cloud = db.write().await;
    if !cloud.vms.contains_key(id) {
        return error(StatusCode::NOT_FOUND, &format!("unable to find virtual machine with id {id}"));
    }
    let jobid = cloud.start_job(command, id, effect);
    envelope(command, json!({"jobid": jobid}))
}

async fn query_async_job_result(db: &Db, params: &Params) -> Reply {
    let jobid = match require(params, "queryAsyncJobResult", "jobid") {
        Ok(jobid) => jobid,
        Err(reply) => return reply,
    };
    match db.write().await.poll_job(jobid) {
        Some(record) => envelope("queryAsyncJobResult", record),
        None => error(StatusCode::NOT_FOUND, &format!("unable to find job with id {jobid}")),
    }
}

async fn list_async_jobs(db: &Db) -> Reply {
    let cloud = db.read().await;
    let items = cloud
        .job_order
        .iter()
        .filter_map(|id| cloud.jobs.get(id))
        .map(job_record)
        .collect();
    listing("listAsyncJobs", "asyncjobs", items)
}

fn list_firewall_rules() -> Reply {
    listing(
        "listFirewallRules",
        "firewallrule",
        vec![json!({
            "id": "fw-1",
            "protocol": "tcp",
            "startport": 22,
            "endport": 22,
            "ipaddress": "10.0.0.1",
            "cidrlist": "0.0.0.0/0",
            "state": "Active",
        })],
    )
}

async fn update_iso_permissions(db: &Db, params: &Params) -> Reply {
    let id = match require(params, "updateIsoPermissions", "id") {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let mut cloud = db.write().await;
    let Some(iso) = cloud.isos.get_mut(id) else {
        return error(StatusCode::NOT_FOUND, &format!("unable to find iso with id {id}"));
    };
    let flag = |name: &str| params.get(name).map(|value| value == "true");
    if let Some(value) = flag("ispublic") {
        iso.ispublic = value;
    }
    if let Some(value) = flag("isfeatured") {
        iso.isfeatured = value;
    }
    if let Some(value) = flag("isextractable") {
        iso.isextractable = value;
    }
    envelope("updateIsoPermissions", json!({"success": "true"}))
}

async fn delete_iso(db: &Db, params: &Params) -> Reply {
    let id = match require(params, "deleteIso", "id") {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    match db.write().await.isos.remove(id) {
        Some(_) => envelope("deleteIso", json!({"success": "true"})),
        None => error(StatusCode::NOT_FOUND, &format!("unable to find iso with id {id}")),
    }
}

fn list_capabilities() -> Reply {
    envelope(
        "listCapabilities",
        json!({"capability": {
            "cloudstackversion": "4.2.0",
            "securitygroupsenabled": false,
            "userpublictemplateenabled": true,
            "supportELB": "false",
        }}),
    )
}
