use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "print_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub printer_id: Uuid,
    pub model_id: Uuid,
    pub studio_id: Option<Uuid>,
    pub status: String,
    pub start_time: DateTimeWithTimeZone,
    pub pause_time: Option<DateTimeWithTimeZone>,
    pub calculated_time_stop: Option<DateTimeWithTimeZone>,
    pub real_time_stop: Option<DateTimeWithTimeZone>,
    pub printing_time: f64,
    pub downtime: f64,
    #[sea_orm(column_type = "Text", nullable)]
    pub stop_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
