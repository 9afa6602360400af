//! [`FleetStore`] on top of sea-orm.
//!
//! `apply` runs in one transaction. Guards are enforced by the writes
//! themselves (`UPDATE ... WHERE status = ?`, `WHERE real_time_stop IS NULL`)
//! so a concurrent writer that got there first makes the transaction roll back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use printdesk_core::store::{Credit, JobSort, JobState, JobWrite, PrinterSort, Transition};
use printdesk_core::{
    FleetError, FleetEvent, FleetStore, JobId, JobPatch, JobQuery, JobStatus, Model, ModelId,
    ParameterId, PrintJob, Printer, PrinterId, PrinterParameter, PrinterPatch, PrinterQuery,
    PrinterStatus, Result, StudioId,
};
use sea_orm::prelude::{DateTimeWithTimeZone, Expr};
use sea_orm::sea_query::SimpleExpr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};

use crate::entities::{fleet_events, models, print_jobs, printer_parameters, printers};

#[derive(Clone)]
pub struct SeaStore {
    db: Arc<DatabaseConnection>,
}

impl SeaStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn db_err(e: DbErr) -> FleetError {
    FleetError::Storage(e.to_string())
}

fn to_db_time(t: DateTime<Utc>) -> DateTimeWithTimeZone {
    t.into()
}

fn from_db_time(t: DateTimeWithTimeZone) -> DateTime<Utc> {
    t.with_timezone(&Utc)
}

fn order(descending: bool) -> Order {
    if descending { Order::Desc } else { Order::Asc }
}

fn page<S: QuerySelect>(select: S, skip: u64, limit: Option<u64>) -> S {
    let select = if skip > 0 { select.offset(skip) } else { select };
    match limit {
        Some(limit) => select.limit(limit),
        None => select,
    }
}

fn printer_from_row(row: printers::Model) -> Result<Printer> {
    let status: PrinterStatus = row
        .status
        .parse()
        .map_err(|e| FleetError::Storage(format!("printer {}: {e}", row.id)))?;
    Ok(Printer {
        id: PrinterId(row.id),
        name: row.name,
        hardware_model: row.hardware_model,
        studio_id: row.studio_id.map(StudioId),
        status,
        total_print_time: row.total_print_time,
        total_downtime: row.total_downtime,
        created_at: from_db_time(row.created_at),
        downtime_accrued_at: row.downtime_accrued_at.map(from_db_time),
    })
}

fn printer_active(p: &Printer) -> printers::ActiveModel {
    printers::ActiveModel {
        id: Set(p.id.0),
        name: Set(p.name.clone()),
        hardware_model: Set(p.hardware_model.clone()),
        studio_id: Set(p.studio_id.map(|s| s.0)),
        status: Set(p.status.as_str().to_string()),
        total_print_time: Set(p.total_print_time),
        total_downtime: Set(p.total_downtime),
        created_at: Set(to_db_time(p.created_at)),
        downtime_accrued_at: Set(p.downtime_accrued_at.map(to_db_time)),
    }
}

fn job_from_row(row: print_jobs::Model) -> Result<PrintJob> {
    let status: JobStatus = row
        .status
        .parse()
        .map_err(|e| FleetError::Storage(format!("print job {}: {e}", row.id)))?;
    Ok(PrintJob {
        id: JobId(row.id),
        printer_id: PrinterId(row.printer_id),
        model_id: ModelId(row.model_id),
        studio_id: row.studio_id.map(StudioId),
        status,
        start_time: from_db_time(row.start_time),
        pause_time: row.pause_time.map(from_db_time),
        calculated_time_stop: row.calculated_time_stop.map(from_db_time),
        real_time_stop: row.real_time_stop.map(from_db_time),
        printing_time: row.printing_time,
        downtime: row.downtime,
        stop_reason: row.stop_reason,
    })
}

fn job_active(j: &PrintJob) -> print_jobs::ActiveModel {
    print_jobs::ActiveModel {
        id: Set(j.id.0),
        printer_id: Set(j.printer_id.0),
        model_id: Set(j.model_id.0),
        studio_id: Set(j.studio_id.map(|s| s.0)),
        status: Set(j.status.as_str().to_string()),
        start_time: Set(to_db_time(j.start_time)),
        pause_time: Set(j.pause_time.map(to_db_time)),
        calculated_time_stop: Set(j.calculated_time_stop.map(to_db_time)),
        real_time_stop: Set(j.real_time_stop.map(to_db_time)),
        printing_time: Set(j.printing_time),
        downtime: Set(j.downtime),
        stop_reason: Set(j.stop_reason.clone()),
    }
}

fn parameter_from_row(row: printer_parameters::Model) -> PrinterParameter {
    PrinterParameter {
        id: ParameterId(row.id),
        printer_id: PrinterId(row.printer_id),
        name: row.name,
        value: row.value,
        created_at: from_db_time(row.created_at),
    }
}

fn model_from_row(row: models::Model) -> Model {
    Model {
        id: ModelId(row.id),
        name: row.name,
        printing_time: row.printing_time,
        studio_id: row.studio_id.map(StudioId),
    }
}

fn event_from_row(row: fleet_events::Model) -> FleetEvent {
    FleetEvent {
        id: row.id,
        printer_id: PrinterId(row.printer_id),
        job_id: row.job_id.map(JobId),
        action: row.action,
        meta: row.meta,
        created_at: from_db_time(row.created_at),
    }
}

fn printer_sort_column(sort: PrinterSort) -> printers::Column {
    match sort {
        PrinterSort::Name => printers::Column::Name,
        PrinterSort::HardwareModel => printers::Column::HardwareModel,
        PrinterSort::Status => printers::Column::Status,
        PrinterSort::TotalPrintTime => printers::Column::TotalPrintTime,
        PrinterSort::TotalDowntime => printers::Column::TotalDowntime,
        PrinterSort::CreatedAt => printers::Column::CreatedAt,
    }
}

fn job_sort_column(sort: JobSort) -> print_jobs::Column {
    match sort {
        JobSort::StartTime => print_jobs::Column::StartTime,
        JobSort::RealTimeStop => print_jobs::Column::RealTimeStop,
        JobSort::CalculatedTimeStop => print_jobs::Column::CalculatedTimeStop,
        JobSort::Status => print_jobs::Column::Status,
        JobSort::PrintingTime => print_jobs::Column::PrintingTime,
        JobSort::Downtime => print_jobs::Column::Downtime,
    }
}

/// Counter column value after applying an absolute patch and an increment.
fn counter_expr(column: printers::Column, set: Option<f64>, add: f64) -> Option<SimpleExpr> {
    match set {
        Some(v) => Some(Expr::value(v + add)),
        None if add != 0.0 => Some(Expr::col(column).add(add)),
        None => None,
    }
}

/// Writes the printer side of a transition. Returns `false` when no row
/// matched, which means the printer left `expected` under us.
async fn write_printer<C: ConnectionTrait>(
    conn: &C,
    id: PrinterId,
    expected: Option<PrinterStatus>,
    patch: &PrinterPatch,
    credit: Credit,
) -> Result<bool> {
    let mut columns: Vec<(printers::Column, SimpleExpr)> = Vec::new();
    if let Some(name) = &patch.name {
        columns.push((printers::Column::Name, Expr::value(name.clone())));
    }
    if let Some(model) = &patch.hardware_model {
        columns.push((printers::Column::HardwareModel, Expr::value(model.clone())));
    }
    if let Some(studio_id) = patch.studio_id {
        columns.push((printers::Column::StudioId, Expr::value(studio_id.map(|s| s.0))));
    }
    if let Some(status) = patch.status.or(expected) {
        // Rewriting the expected status takes the row lock.
        columns.push((printers::Column::Status, Expr::value(status.as_str())));
    }
    if let Some(e) = counter_expr(
        printers::Column::TotalPrintTime,
        patch.total_print_time,
        credit.print_minutes,
    ) {
        columns.push((printers::Column::TotalPrintTime, e));
    }
    if let Some(e) = counter_expr(
        printers::Column::TotalDowntime,
        patch.total_downtime,
        credit.downtime_minutes,
    ) {
        columns.push((printers::Column::TotalDowntime, e));
    }
    if let Some(at) = patch.downtime_accrued_at {
        columns.push((
            printers::Column::DowntimeAccruedAt,
            Expr::value(at.map(to_db_time)),
        ));
    }
    if columns.is_empty() {
        return Ok(true);
    }

    let mut update = printers::Entity::update_many().filter(printers::Column::Id.eq(id.0));
    if let Some(expected) = expected {
        update = update.filter(printers::Column::Status.eq(expected.as_str()));
    }
    for (column, expr) in columns {
        update = update.col_expr(column, expr);
    }
    let res = update.exec(conn).await.map_err(db_err)?;
    Ok(res.rows_affected > 0)
}

#[async_trait]
impl FleetStore for SeaStore {
    async fn create_printer(&self, printer: Printer) -> Result<Printer> {
        printers::Entity::insert(printer_active(&printer))
            .exec_without_returning(&*self.db)
            .await
            .map_err(db_err)?;
        Ok(printer)
    }

    async fn get_printer(&self, id: PrinterId) -> Result<Option<Printer>> {
        printers::Entity::find_by_id(id.0)
            .one(&*self.db)
            .await
            .map_err(db_err)?
            .map(printer_from_row)
            .transpose()
    }

    async fn update_printer(&self, id: PrinterId, patch: PrinterPatch) -> Result<Option<Printer>> {
        patch.validate()?;
        let Some(mut printer) = self.get_printer(id).await? else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(printer));
        }
        patch.apply_to(&mut printer);
        printers::Entity::update(printer_active(&printer))
            .exec(&*self.db)
            .await
            .map_err(db_err)?;
        Ok(Some(printer))
    }

    async fn delete_printer(&self, id: PrinterId) -> Result<Option<Printer>> {
        let Some(printer) = self.get_printer(id).await? else {
            return Ok(None);
        };
        let txn = self.db.begin().await.map_err(db_err)?;
        printer_parameters::Entity::delete_many()
            .filter(printer_parameters::Column::PrinterId.eq(id.0))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        printers::Entity::delete_by_id(id.0)
            .exec(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(Some(printer))
    }

    async fn list_printers(&self, query: &PrinterQuery) -> Result<Vec<Printer>> {
        let mut select = printers::Entity::find();
        if let Some(studio_id) = query.studio_id {
            select = select.filter(printers::Column::StudioId.eq(studio_id.0));
        }
        select = match query.sort {
            Some(sort) => select.order_by(printer_sort_column(sort), order(query.descending)),
            None => select.order_by(printers::Column::CreatedAt, Order::Asc),
        };
        page(select.order_by(printers::Column::Id, Order::Asc), query.skip, query.limit)
            .all(&*self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(printer_from_row)
            .collect()
    }

    async fn add_parameter(&self, parameter: PrinterParameter) -> Result<PrinterParameter> {
        let row = printer_parameters::ActiveModel {
            id: Set(parameter.id.0),
            printer_id: Set(parameter.printer_id.0),
            name: Set(parameter.name.clone()),
            value: Set(parameter.value.clone()),
            created_at: Set(to_db_time(parameter.created_at)),
        };
        printer_parameters::Entity::insert(row)
            .exec_without_returning(&*self.db)
            .await
            .map_err(db_err)?;
        Ok(parameter)
    }

    async fn list_parameters(&self, printer_id: PrinterId) -> Result<Vec<PrinterParameter>> {
        Ok(printer_parameters::Entity::find()
            .filter(printer_parameters::Column::PrinterId.eq(printer_id.0))
            .order_by(printer_parameters::Column::CreatedAt, Order::Asc)
            .all(&*self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(parameter_from_row)
            .collect())
    }

    async fn delete_parameter(
        &self,
        printer_id: PrinterId,
        id: ParameterId,
    ) -> Result<Option<PrinterParameter>> {
        let Some(row) = printer_parameters::Entity::find_by_id(id.0)
            .filter(printer_parameters::Column::PrinterId.eq(printer_id.0))
            .one(&*self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        printer_parameters::Entity::delete_by_id(id.0)
            .exec(&*self.db)
            .await
            .map_err(db_err)?;
        Ok(Some(parameter_from_row(row)))
    }

    async fn create_model(&self, model: Model) -> Result<Model> {
        let row = models::ActiveModel {
            id: Set(model.id.0),
            name: Set(model.name.clone()),
            printing_time: Set(model.printing_time),
            studio_id: Set(model.studio_id.map(|s| s.0)),
        };
        models::Entity::insert(row)
            .exec_without_returning(&*self.db)
            .await
            .map_err(db_err)?;
        Ok(model)
    }

    async fn get_model(&self, id: ModelId) -> Result<Option<Model>> {
        Ok(models::Entity::find_by_id(id.0)
            .one(&*self.db)
            .await
            .map_err(db_err)?
            .map(model_from_row))
    }

    async fn get_job(&self, id: JobId) -> Result<Option<PrintJob>> {
        print_jobs::Entity::find_by_id(id.0)
            .one(&*self.db)
            .await
            .map_err(db_err)?
            .map(job_from_row)
            .transpose()
    }

    async fn update_job(&self, id: JobId, patch: JobPatch) -> Result<Option<PrintJob>> {
        let Some(job) = self.get_job(id).await? else {
            return Ok(None);
        };
        let job = patch.patched(&job)?;
        print_jobs::Entity::update(job_active(&job))
            .exec(&*self.db)
            .await
            .map_err(db_err)?;
        Ok(Some(job))
    }

    async fn delete_job(&self, id: JobId) -> Result<Option<PrintJob>> {
        let Some(job) = self.get_job(id).await? else {
            return Ok(None);
        };
        print_jobs::Entity::delete_by_id(id.0)
            .exec(&*self.db)
            .await
            .map_err(db_err)?;
        Ok(Some(job))
    }

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<PrintJob>> {
        let mut select = print_jobs::Entity::find();
        if let Some(printer_id) = query.printer_id {
            select = select.filter(print_jobs::Column::PrinterId.eq(printer_id.0));
        }
        if let Some(studio_id) = query.studio_id {
            select = select.filter(print_jobs::Column::StudioId.eq(studio_id.0));
        }
        select = match query.state {
            JobState::Any => select,
            JobState::Open => select.filter(print_jobs::Column::RealTimeStop.is_null()),
            JobState::Stopped => select.filter(print_jobs::Column::RealTimeStop.is_not_null()),
        };
        if let Some((from, to)) = query.started {
            select = select
                .filter(print_jobs::Column::StartTime.gte(to_db_time(from)))
                .filter(print_jobs::Column::StartTime.lt(to_db_time(to)));
        }
        select = match query.sort {
            Some(sort) => select.order_by(job_sort_column(sort), order(query.descending)),
            None => select.order_by(print_jobs::Column::StartTime, Order::Asc),
        };
        page(select.order_by(print_jobs::Column::Id, Order::Asc), query.skip, query.limit)
            .all(&*self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(job_from_row)
            .collect()
    }

    async fn apply(&self, transition: Transition) -> Result<()> {
        transition.printer.validate()?;
        let printer_id = transition.printer_id;
        let txn = self.db.begin().await.map_err(db_err)?;

        let exists = printers::Entity::find_by_id(printer_id.0)
            .one(&txn)
            .await
            .map_err(db_err)?
            .is_some();
        if !exists {
            return Err(FleetError::not_found("printer", printer_id));
        }

        // The printer write goes first: its WHERE clause is the status guard,
        // and a job guard failing afterwards drops `txn`, which rolls it back.
        let matched = write_printer(
            &txn,
            printer_id,
            transition.expect_printer_status,
            &transition.printer,
            transition.credit,
        )
        .await?;
        if !matched {
            let actual = printers::Entity::find_by_id(printer_id.0)
                .one(&txn)
                .await
                .map_err(db_err)?
                .map(printer_from_row)
                .transpose()?
                .ok_or_else(|| FleetError::not_found("printer", printer_id))?;
            return Err(match transition.expect_printer_status {
                Some(expected) => FleetError::InvalidState(format!(
                    "printer {printer_id} is {}, expected {expected}",
                    actual.status
                )),
                None => FleetError::not_found("printer", printer_id),
            });
        }

        match transition.job {
            Some(JobWrite::Insert(job)) => {
                if job.is_open() {
                    let open = print_jobs::Entity::find()
                        .filter(print_jobs::Column::PrinterId.eq(job.printer_id.0))
                        .filter(print_jobs::Column::RealTimeStop.is_null())
                        .count(&txn)
                        .await
                        .map_err(db_err)?;
                    if open > 0 {
                        return Err(FleetError::InvalidState(format!(
                            "printer {} already has an open job",
                            job.printer_id
                        )));
                    }
                }
                print_jobs::Entity::insert(job_active(&job))
                    .exec_without_returning(&txn)
                    .await
                    .map_err(db_err)?;
            }
            Some(JobWrite::Update {
                id,
                patch,
                require_open,
            }) => {
                let current = print_jobs::Entity::find_by_id(id.0)
                    .one(&txn)
                    .await
                    .map_err(db_err)?
                    .map(job_from_row)
                    .transpose()?
                    .ok_or_else(|| FleetError::not_found("job", id))?;
                if require_open && !current.is_open() {
                    return Err(FleetError::AlreadyClosed { id });
                }
                let next = patch.patched(&current)?;

                let mut update = print_jobs::Entity::update_many()
                    .set(job_active(&next))
                    .filter(print_jobs::Column::Id.eq(id.0));
                if require_open {
                    update = update.filter(print_jobs::Column::RealTimeStop.is_null());
                }
                let res = update.exec(&txn).await.map_err(db_err)?;
                if res.rows_affected == 0 {
                    return Err(FleetError::AlreadyClosed { id });
                }
            }
            None => {}
        }

        if let Some(event) = transition.event {
            let row = fleet_events::ActiveModel {
                id: Set(event.id),
                printer_id: Set(event.printer_id.0),
                job_id: Set(event.job_id.map(|j| j.0)),
                action: Set(event.action.clone()),
                meta: Set(event.meta.clone()),
                created_at: Set(to_db_time(event.created_at)),
            };
            fleet_events::Entity::insert(row)
                .exec_without_returning(&txn)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;
        tracing::debug!(%printer_id, "fleet transition committed");
        Ok(())
    }

    async fn list_events(&self, printer_id: PrinterId) -> Result<Vec<FleetEvent>> {
        Ok(fleet_events::Entity::find()
            .filter(fleet_events::Column::PrinterId.eq(printer_id.0))
            .order_by(fleet_events::Column::CreatedAt, Order::Asc)
            .all(&*self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(event_from_row)
            .collect())
    }
}
