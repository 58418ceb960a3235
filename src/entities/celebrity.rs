use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "celebrities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub known_for: Option<String>,
    pub nationality: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
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
