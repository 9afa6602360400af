use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PrintJobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PrintJobs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PrintJobs::PrinterId).uuid().not_null())
                    .col(ColumnDef::new(PrintJobs::ModelId).uuid().not_null())
                    .col(ColumnDef::new(PrintJobs::StudioId).uuid().null())
                    .col(ColumnDef::new(PrintJobs::Status).string().not_null())
                    .col(
                        ColumnDef::new(PrintJobs::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PrintJobs::PauseTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PrintJobs::CalculatedTimeStop)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PrintJobs::RealTimeStop)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PrintJobs::PrintingTime)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(PrintJobs::Downtime)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(PrintJobs::StopReason).text().null())
                    .to_owned(),
            )
            .await?;

        // Open-job lookups filter on printer and a null stop time.
        manager
            .create_index(
                Index::create()
                    .name("idx_print_jobs_printer_id_real_time_stop")
                    .table(PrintJobs::Table)
                    .col(PrintJobs::PrinterId)
                    .col(PrintJobs::RealTimeStop)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_print_jobs_start_time")
                    .table(PrintJobs::Table)
                    .col(PrintJobs::StartTime)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PrintJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PrintJobs {
    Table,
    Id,
    PrinterId,
    ModelId,
    StudioId,
    Status,
    StartTime,
    PauseTime,
    CalculatedTimeStop,
    RealTimeStop,
    PrintingTime,
    Downtime,
    StopReason,
}
