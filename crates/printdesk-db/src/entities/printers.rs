use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "printers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub hardware_model: Option<String>,
    pub studio_id: Option<Uuid>,
    pub status: String,
    pub total_print_time: f64,
    pub total_downtime: f64,
    pub created_at: DateTimeWithTimeZone,
    pub downtime_accrued_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
