use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FleetEvents::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FleetEvents::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(FleetEvents::PrinterId).uuid().not_null())
                    .col(ColumnDef::new(FleetEvents::JobId).uuid().null())
                    .col(ColumnDef::new(FleetEvents::Action).string().not_null())
                    .col(ColumnDef::new(FleetEvents::Meta).json_binary().null())
                    .col(
                        ColumnDef::new(FleetEvents::CreatedAt)
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
                    .name("idx_fleet_events_printer_id")
                    .table(FleetEvents::Table)
                    .col(FleetEvents::PrinterId)
                    .col(FleetEvents::CreatedAt)
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
                    .name("idx_fleet_events_printer_id")
                    .table(FleetEvents::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(FleetEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FleetEvents {
    Table,
    Id,
    PrinterId,
    JobId,
    Action,
    Meta,
    CreatedAt,
}
