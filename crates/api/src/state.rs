use std::sync::Arc;

use cofoundry_config::Settings;
use cofoundry_services::{
    AuthService, ConnectionRequestService, JoinRequestService, RealtimeStore,
    dao::{IdeaDao, NegotiationDao, NotificationDao, UserDao},
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<dyn RealtimeStore>,
    pub auth: Arc<AuthService>,
    pub users: UserDao,
    pub ideas: IdeaDao,
    pub negotiations: NegotiationDao,
    pub notifications: NotificationDao,
    pub connections: ConnectionRequestService,
    pub joins: JoinRequestService,
}

impl AppState {
    pub fn new(store: Arc<dyn RealtimeStore>, settings: Settings) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let users = UserDao::new(store.clone());
        let ideas = IdeaDao::new(store.clone());
        let negotiations = NegotiationDao::new(store.clone());
        let notifications = NotificationDao::new(store.clone());
        let connections = ConnectionRequestService::new(store.clone());
        let joins = JoinRequestService::new(store.clone());

        Self {
            settings,
            store,
            auth,
            users,
            ideas,
            negotiations,
            notifications,
            connections,
            joins,
        }
    }
}
