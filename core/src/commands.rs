//! Descriptor table for the CloudStack commands this crate exposes.

use crate::fallback::Fallback;
use crate::http::HttpMethod;
use crate::operation::{Operation, Param};
use crate::parser::ResponseParser;

const fn list(command: &'static str) -> Operation {
    Operation {
        command,
        method: HttpMethod::Get,
        fixed: &[],
        params: &[],
        parser: ResponseParser::UnwrapNestedSet,
        fallback: Fallback::EmptySetOnNotFound,
    }
}

pub const LIST_ZONES: Operation = list("listZones");

pub const LIST_VIRTUAL_MACHINES: Operation = list("listVirtualMachines");

pub const LIST_ASYNC_JOBS: Operation = list("listAsyncJobs");

pub const LIST_FIREWALL_RULES: Operation = Operation {
    fixed: &[("listAll", "true")],
    ..list("listFirewallRules")
};

/// `listVirtualMachines` narrowed to one id; nothing found is `None`.
pub const GET_VIRTUAL_MACHINE: Operation = Operation {
    command: "listVirtualMachines",
    method: HttpMethod::Get,
    fixed: &[],
    params: &[Param::required("id")],
    parser: ResponseParser::UnwrapNestedValue,
    fallback: Fallback::NullOnNotFound,
};

pub const DEPLOY_VIRTUAL_MACHINE: Operation = Operation {
    command: "deployVirtualMachine",
    method: HttpMethod::Get,
    fixed: &[],
    params: &[
        Param::required("zoneid"),
        Param::required("serviceofferingid"),
        Param::required("templateid"),
    ],
    parser: ResponseParser::UnwrapOnlyValue,
    fallback: Fallback::MapHttp4xxToError,
};

pub const DESTROY_VIRTUAL_MACHINE: Operation = Operation {
    command: "destroyVirtualMachine",
    method: HttpMethod::Get,
    fixed: &[],
    params: &[Param::required("id")],
    parser: ResponseParser::UnwrapOnlyValue,
    fallback: Fallback::NullOnNotFound,
};

pub const REBOOT_VIRTUAL_MACHINE: Operation = Operation {
    command: "rebootVirtualMachine",
    method: HttpMethod::Get,
    fixed: &[],
    params: &[Param::required("id")],
    parser: ResponseParser::UnwrapOnlyValue,
    fallback: Fallback::MapHttp4xxToError,
};

pub const QUERY_ASYNC_JOB_RESULT: Operation = Operation {
    command: "queryAsyncJobResult",
    method: HttpMethod::Get,
    fixed: &[],
    params: &[Param::required("jobid")],
    parser: ResponseParser::UnwrapOnlyValue,
    fallback: Fallback::NullOnNotFound,
};

pub const UPDATE_ISO_PERMISSIONS: Operation = Operation {
    command: "updateIsoPermissions",
    method: HttpMethod::Get,
    fixed: &[],
    params: &[Param::required("id")],
    parser: ResponseParser::ReleaseAndReturnVoid,
    fallback: Fallback::MapHttp4xxToError,
};

pub const DELETE_ISO: Operation = Operation {
    command: "deleteIso",
    method: HttpMethod::Get,
    fixed: &[],
    params: &[Param::required("id")],
    parser: ResponseParser::ReleaseAndReturnVoid,
    fallback: Fallback::VoidOnNotFound,
};

/// Raw capability document, envelope included.
pub const LIST_CAPABILITIES: Operation = Operation {
    command: "listCapabilities",
    method: HttpMethod::Get,
    fixed: &[],
    params: &[],
    parser: ResponseParser::Identity,
    fallback: Fallback::MapHttp4xxToError,
};

pub const ALL: &[&Operation] = &[
    &LIST_ZONES,
    &LIST_VIRTUAL_MACHINES,
    &LIST_ASYNC_JOBS,
    &LIST_FIREWALL_RULES,
    &GET_VIRTUAL_MACHINE,
    &DEPLOY_VIRTUAL_MACHINE,
    &DESTROY_VIRTUAL_MACHINE,
    &REBOOT_VIRTUAL_MACHINE,
    &QUERY_ASYNC_JOB_RESULT,
    &UPDATE_ISO_PERMISSIONS,
    &DELETE_ISO,
    &LIST_CAPABILITIES,
];
