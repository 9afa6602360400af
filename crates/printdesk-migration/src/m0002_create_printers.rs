use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Printers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Printers::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Printers::Name).string().not_null())
                    .col(ColumnDef::new(Printers::HardwareModel).string().null())
                    .col(ColumnDef::new(Printers::StudioId).uuid().null())
                    .col(
                        ColumnDef::new(Printers::Status)
                            .string()
                            .not_null()
                            .default("idle"),
                    )
                    .col(
                        ColumnDef::new(Printers::TotalPrintTime)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Printers::TotalDowntime)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Printers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Printers::DowntimeAccruedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_printers_studio_id")
                    .table(Printers::Table)
                    .col(Printers::StudioId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Printers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Printers {
    Table,
    Id,
    Name,
    HardwareModel,
    StudioId,
    Status,
    TotalPrintTime,
    TotalDowntime,
    CreatedAt,
    DowntimeAccruedAt,
}
