use std::time::Instant;

use itertools::Itertools;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

use crate::acl::{RequiredPorts, evaluate_acls};
use crate::config::EngineConfig;
use crate::error::ReachabilityError;
use crate::metrics::{self, EvaluationPhases, EvaluationStats};
use crate::nat::evaluate_nat_path;
use crate::route::{RouteEndpoint, RoutePathQuery, evaluate_routes};
use crate::rule_match::Remote;
use crate::security_group::evaluate_groups;
use crate::timers::CheckTimer;
use crate::types::{Cause, Check, CheckReport, Direction, Protocol, ReachabilityRequest, Verdict};

/// The main engine handle. Cheap to clone, holds only configuration.
#[derive(Debug, Clone, Default)]
pub struct ReachabilityEngine {
    config: EngineConfig,
}

/// Reports of the checks that ran, and the first failure if any.
struct Run {
    reports: Vec<CheckReport>,
    failure: Option<ReachabilityError>,
}

impl ReachabilityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every enabled check and stop at the first failure, which is
    /// returned as the error.
    pub fn evaluate(&self, request: &ReachabilityRequest) -> Result<Verdict, ReachabilityError> {
        let run = self.run(request, true);
        match run.failure {
            Some(err) => Err(err),
            None => Ok(Verdict::allowed(run.reports)),
        }
    }

    /// Like [`evaluate`](Self::evaluate), but denials become part of the
    /// verdict. With `fail_fast` disabled every enabled check runs and each
    /// failure is listed in `checks`; the first one is the reason.
    pub fn diagnose(&self, request: &ReachabilityRequest) -> Verdict {
        let run = self.run(request, self.config.fail_fast);
        match run.failure {
            Some(err) => Verdict::denied(Cause::from(&err), run.reports),
            None => Verdict::allowed(run.reports),
        }
    }

    fn run(&self, request: &ReachabilityRequest, fail_fast: bool) -> Run {
        let started = Instant::now();
        let mut phases = EvaluationPhases::default();
        let mut reports = Vec::new();
        let mut failed_check = None;
        let protocol = request.protocol.unwrap_or(self.config.protocol);

        debug!(
            event = "Request",
            phase = "Evaluation",
            request = %request,
            protocol = %protocol,
            fail_fast
        );

        // 1. Reject requests that cannot be evaluated at all
        let mut failure = validate(request).err();
        if let Some(err) = &failure {
            warn!(event = "Request", phase = "Validation", error = %err);
        }

        // 2. Run the enabled checks in order. NAT only applies when a path was given
        if failure.is_none() {
            let checks = Check::iter().filter(|&check| {
                self.config.is_enabled(check)
                    && (check != Check::NatGateway || request.nat.is_some())
            });
            for check in checks {
                let outcome = {
                    let _timer = CheckTimer::start(check, &mut phases);
                    run_check(check, request, protocol)
                };

                match outcome {
                    Ok(message) => {
                        debug!(event = "Request", phase = "Check", check = %check, passed = true, detail = %message);
                        reports.push(CheckReport::passed(check, message));
                    }
                    Err(err) => {
                        warn!(event = "Request", phase = "Check", check = %check, passed = false, error = %err);
                        reports.push(CheckReport::failed(check, &err));
                        failed_check.get_or_insert(check);
                        failure.get_or_insert(err);
                        if fail_fast {
                            break;
                        }
                    }
                }
            }
        }

        // 3. Report
        let duration = started.elapsed();
        phases.total_ms = duration.as_secs_f64() * 1000.0;
        let allowed = failure.is_none();
        if metrics::has_sink() {
            let stats = EvaluationStats {
                duration,
                allowed,
                source_vpc: request.source.network.vpc_id.clone(),
                destination_vpc: request.destination.network.vpc_id.clone(),
                failed_check,
            };
            metrics::record_evaluation(&stats, &phases);
        }

        info!(
            event = "Request",
            phase = "Verdict",
            allowed,
            failed_check = ?failed_check,
            total_ms = phases.total_ms
        );

        Run { reports, failure }
    }
}

fn validate(request: &ReachabilityRequest) -> Result<(), ReachabilityError> {
    let source = &request.source;
    let destination = &request.destination;
    if source.addresses.is_empty() {
        return Err(ReachabilityError::Validation(format!(
            "source in VPC {} has no addresses",
            source.network.vpc_id
        )));
    }
    if destination.subnet_cidrs.is_empty() {
        return Err(ReachabilityError::Validation(format!(
            "destination in VPC {} has no subnet CIDRs",
            destination.network.vpc_id
        )));
    }
    if destination.ports.is_empty() {
        return Err(ReachabilityError::Validation(format!(
            "destination in VPC {} has no ports to check",
            destination.network.vpc_id
        )));
    }
    Ok(())
}

fn run_check(
    check: Check,
    request: &ReachabilityRequest,
    protocol: Protocol,
) -> Result<String, ReachabilityError> {
    match check {
        Check::NetworkAcl => check_network_acls(request, protocol),
        Check::SecurityGroup => check_security_groups(request, protocol),
        Check::RouteTable => check_route_tables(request),
        Check::NatGateway => check_nat_gateway(request),
    }
}

fn check_network_acls(
    request: &ReachabilityRequest,
    protocol: Protocol,
) -> Result<String, ReachabilityError> {
    let source = &request.source;
    let destination = &request.destination;
    let required: RequiredPorts = destination
        .ports
        .iter()
        .map(|&port| (port, protocol))
        .collect();

    // Source subnets must let traffic out toward every destination subnet
    evaluate_acls(
        &source.network.network_acls,
        Direction::Egress,
        &required,
        Remote::Networks(&destination.subnet_cidrs),
    )
    .map_err(|err| err.with_context(format!("source {}", source.network.vpc_id)))?;

    // and destination subnets must let the source addresses in.
    evaluate_acls(
        &destination.network.network_acls,
        Direction::Ingress,
        &required,
        Remote::Addresses(&source.addresses),
    )
    .map_err(|err| err.with_context(format!("destination {}", destination.network.vpc_id)))?;

    Ok(format!(
        "network acls allow {protocol} traffic on port(s) {}",
        required.keys().join(", ")
    ))
}

fn check_security_groups(
    request: &ReachabilityRequest,
    protocol: Protocol,
) -> Result<String, ReachabilityError> {
    let source = &request.source;
    let destination = &request.destination;
    let source_group_ids = source.network.security_group_ids();
    let destination_group_ids = destination.network.security_group_ids();

    let mut grants = Vec::new();
    for &port in destination.ports.iter().unique() {
        let egress = evaluate_groups(
            &source.network.security_groups,
            Direction::Egress,
            Remote::Networks(&destination.subnet_cidrs),
            &destination_group_ids,
            protocol,
            port,
        )
        .map_err(|err| err.with_context(format!("source {}", source.network.vpc_id)))?;

        let ingress = evaluate_groups(
            &destination.network.security_groups,
            Direction::Ingress,
            Remote::Addresses(&source.addresses),
            &source_group_ids,
            protocol,
            port,
        )
        .map_err(|err| err.with_context(format!("destination {}", destination.network.vpc_id)))?;

        grants.push(format!(
            "port {port} egress via {}, ingress via {}",
            egress.group_id, ingress.group_id
        ));
    }

    Ok(format!(
        "security groups allow {protocol} traffic: {}",
        grants.join("; ")
    ))
}

fn check_route_tables(request: &ReachabilityRequest) -> Result<String, ReachabilityError> {
    let source = &request.source.network;
    let destination = &request.destination.network;
    let source_targets = request.source.address_networks();

    let query = RoutePathQuery {
        source: RouteEndpoint {
            vpc_id: &source.vpc_id,
            subnet_ids: &source.subnet_ids,
            targets: &source_targets,
            route_tables: &source.route_tables,
            vpc_route_tables: &source.vpc_route_tables,
        },
        destination: RouteEndpoint {
            vpc_id: &destination.vpc_id,
            subnet_ids: &destination.subnet_ids,
            targets: &request.destination.subnet_cidrs,
            route_tables: &destination.route_tables,
            vpc_route_tables: &destination.vpc_route_tables,
        },
    };

    evaluate_routes(&query)
        .map(|outcome| outcome.to_string())
        .map_err(|err| err.with_context(format!("{} -> {}", source.vpc_id, destination.vpc_id)))
}

fn check_nat_gateway(request: &ReachabilityRequest) -> Result<String, ReachabilityError> {
    let Some(nat) = &request.nat else {
        return Ok("no nat gateway path requested".to_string());
    };
    evaluate_nat_path(nat)
        .map(|outcome| outcome.to_string())
        .map_err(|err| err.with_context(format!("nat path {} -> {}", nat.source, nat.destination)))
}

#[cfg(test)]
mod tests;
