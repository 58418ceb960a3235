use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "films")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub poster_url: Option<String>,
    pub release_year: Option<i32>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub rating: Option<f64>,
    pub duration_minutes: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::film_cast::Entity")]
    FilmCast,
}

impl Related<super::film_cast::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FilmCast.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
