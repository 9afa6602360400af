use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PrinterParameters::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PrinterParameters::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PrinterParameters::PrinterId).uuid().not_null())
                    .col(ColumnDef::new(PrinterParameters::Name).string().not_null())
                    .col(ColumnDef::new(PrinterParameters::Value).string().null())
                    .col(
                        ColumnDef::new(PrinterParameters::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_printer_parameters_printer_id")
                    .table(PrinterParameters::Table)
                    .col(PrinterParameters::PrinterId)
                    .col(PrinterParameters::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_printer_parameters_printer_id")
                    .table(PrinterParameters::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(PrinterParameters::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PrinterParameters {
    Table,
    Id,
    PrinterId,
    Name,
    Value,
    CreatedAt,
}
