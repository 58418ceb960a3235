use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "film_cast")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub film_id: Uuid,
    pub celebrity_id: Uuid,
    pub role_name: Option<String>,
    pub is_lead: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::film::Entity",
        from = "Column::FilmId",
        to = "super::film::Column::Id"
    )]
    Film,
    #[sea_orm(
        belongs_to = "super::celebrity::Entity",
        from = "Column::CelebrityId",
        to = "super::celebrity::Column::Id"
    )]
    Celebrity,
}

impl Related<super::film::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Film.def()
    }
}

impl Related<super::celebrity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Celebrity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
